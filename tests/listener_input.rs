mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use console_controls::{
    Button, ControlEvent, ControlKeyStates, InputRecord, MemoryConsole, MouseButtonStates, Point,
    Rect, Size, VirtualKey, Window, WindowOptions,
};
use support::{key, tab, wait_until, window_lock};

fn options() -> WindowOptions {
    WindowOptions::default().with_poll_interval(Duration::from_millis(5))
}

#[test]
fn listener_delivers_records_to_the_pump() {
    let _lock = window_lock();
    let console = MemoryConsole::with_input(Size::new(20, 5));
    let window = Window::with_options(console.clone(), options()).unwrap();
    let button = window
        .add(window.control(Button::new("go")).area(Rect::new(0, 0, 6, 3)))
        .unwrap();
    let clicks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&clicks);
    window
        .subscribe_control(button, move |event: &mut ControlEvent| {
            if *event == ControlEvent::Clicked {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    console.push_input(vec![
        tab(),
        key(VirtualKey::RETURN, ControlKeyStates::NONE),
    ]);
    assert!(wait_until(Duration::from_secs(5), || {
        window.run_once().unwrap();
        clicks.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(window.focused_control(), Some(button));
}

#[test]
fn read_failures_do_not_stop_the_listener() {
    let _lock = window_lock();
    let console = MemoryConsole::with_input(Size::new(20, 5));
    let window = Window::with_options(console.clone(), options()).unwrap();
    let button = window
        .add(window.control(Button::new("go")).area(Rect::new(0, 0, 6, 3)))
        .unwrap();

    console.fail_next_read();
    console.push_input(vec![tab()]);
    assert!(wait_until(Duration::from_secs(5), || {
        window.run_once().unwrap();
        window.focused_control() == Some(button)
    }));
}

#[test]
fn resize_records_reach_area_subscribers_and_redraw() {
    let _lock = window_lock();
    let console = MemoryConsole::with_input(Size::new(20, 5));
    let window = Window::with_options(console.clone(), options()).unwrap();
    let resized = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resized);
    window
        .events(|events| {
            events.area_changed.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        })
        .unwrap();
    let flushes = console.flush_count();

    console.push_input(vec![InputRecord::Resize {
        buffer_size: Size::new(30, 8),
        window_area: Rect::new(0, 0, 30, 8),
    }]);
    assert!(wait_until(Duration::from_secs(5), || {
        window.run_once().unwrap();
        resized.load(Ordering::SeqCst) == 1
    }));
    assert!(console.flush_count() > flushes);
}

#[test]
fn handle_close_request_ends_run() {
    let _lock = window_lock();
    let console = MemoryConsole::with_input(Size::new(20, 5));
    let window = Window::with_options(console.clone(), options()).unwrap();
    let handle = window.handle();

    let poster = thread::spawn(move || {
        handle.post(InputRecord::mouse_press(Point::new(1, 1), MouseButtonStates::LEFT));
        thread::sleep(Duration::from_millis(20));
        handle.request_close(4);
    });
    assert_eq!(window.run().unwrap(), 4);
    poster.join().unwrap();
    assert!(window.is_disposed());
    assert!(console.is_closed());
}
