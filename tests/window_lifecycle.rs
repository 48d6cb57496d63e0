mod support;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use console_controls::{
    ControlId, ControlKeyStates, CursorInfo, Error, MemoryConsole, Panel, Point, Rect, Size,
    VirtualKey, Window,
};
use support::{key, window_lock};

#[test]
fn close_key_disposes_and_restores_the_console() {
    let _lock = window_lock();
    let console = MemoryConsole::new(Size::new(20, 5));
    let original = console.cursor();
    let window = Window::new(console.clone()).unwrap();
    assert!(!console.cursor().visible);

    let seen = Arc::new(AtomicI32::new(-1));
    let sink = Arc::clone(&seen);
    window
        .events(|events| {
            events.disposed.subscribe(move |closed| {
                sink.store(closed.exit_code, Ordering::SeqCst);
            });
        })
        .unwrap();

    window
        .dispatch(key(VirtualKey::F4, ControlKeyStates::LEFT_ALT))
        .unwrap();
    assert!(window.is_disposed());
    assert!(console.is_closed());
    assert_eq!(console.cursor(), original);
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    assert!(matches!(window.set_title("late"), Err(Error::Disposed)));
    assert!(matches!(window.run_once(), Err(Error::Disposed)));
}

#[test]
fn a_new_window_may_open_after_dispose() {
    let _lock = window_lock();
    let first = Window::new(MemoryConsole::new(Size::new(4, 4))).unwrap();
    assert!(matches!(
        Window::new(MemoryConsole::new(Size::new(4, 4))),
        Err(Error::WindowAlreadyLive)
    ));
    first.close(3);
    first.dispose();
    assert_eq!(first.exit_code(), 3);

    let second = Window::new(MemoryConsole::new(Size::new(4, 4))).unwrap();
    drop(second);
    let third = Window::new(MemoryConsole::new(Size::new(4, 4))).unwrap();
    assert!(!third.is_disposed());
}

#[test]
fn controls_from_another_window_are_rejected() {
    let _lock = window_lock();
    let old = Window::new(MemoryConsole::new(Size::new(10, 10))).unwrap();
    let stale_control = old.control(Panel::new()).area(Rect::new(0, 0, 2, 2));
    let stale_id = old
        .add(old.control(Panel::new()).area(Rect::new(0, 0, 2, 2)))
        .unwrap();
    drop(old);

    let window = Window::new(MemoryConsole::new(Size::new(10, 10))).unwrap();
    assert!(matches!(
        window.add(stale_control),
        Err(Error::CrossWindowOwnership)
    ));
    assert!(matches!(
        window.set_area(stale_id, Rect::new(1, 1, 1, 1)),
        Err(Error::CrossWindowOwnership)
    ));
}

#[test]
fn removed_ids_stay_invalid_after_re_adding() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(10, 10))).unwrap();
    let parent = window
        .add(window.control(Panel::new()).area(Rect::new(0, 0, 8, 8)))
        .unwrap();
    let child = window
        .add_to(
            parent,
            window.control(Panel::new()).area(Rect::new(1, 1, 2, 2)),
        )
        .unwrap();

    let detached = window.remove(parent).unwrap();
    assert_eq!(detached.children().len(), 1);
    assert!(!window.contains(child));
    assert!(matches!(
        window.set_name(child, "gone"),
        Err(Error::ControlNotFound(_))
    ));

    let again = window.add(detached).unwrap();
    assert_ne!(again, parent);
    let children = window.children(Some(again)).unwrap();
    assert_eq!(children.len(), 1);
    assert_ne!(children[0], child);
    assert_eq!(
        window.absolute_area(children[0]).unwrap(),
        Rect::new(1, 1, 2, 2)
    );
}

#[test]
fn add_range_attaches_all_or_nothing() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(10, 10))).unwrap();
    let changes: Arc<Mutex<Vec<Vec<ControlId>>>> = Arc::default();
    let sink = Arc::clone(&changes);
    window
        .events(|events| {
            events.controls_changed.subscribe(move |change| {
                sink.lock().unwrap().push(change.added.clone());
            });
        })
        .unwrap();

    let ids = window
        .add_range(
            None,
            vec![
                Some(window.control(Panel::new())),
                None,
                Some(window.control(Panel::new())),
            ],
        )
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(*changes.lock().unwrap(), vec![ids.clone()]);

    assert!(window.add_range(None, vec![None, None]).unwrap().is_empty());
    assert_eq!(changes.lock().unwrap().len(), 1);

    let rejected = window.add_range(
        None,
        vec![
            Some(window.control(Panel::new())),
            Some(window.control(Panel::new()).area(Rect::new(0, 0, -1, 1))),
        ],
    );
    assert!(rejected.is_err());
    assert_eq!(window.children(None).unwrap().len(), 2);
    assert_eq!(changes.lock().unwrap().len(), 1);
}

#[test]
fn cursor_is_restored_from_the_original_console_state() {
    let _lock = window_lock();
    let console = MemoryConsole::new(Size::new(10, 4));
    let mut backend = console.clone();
    let original = CursorInfo {
        visible: true,
        size: 50,
        position: Point::new(3, 2),
    };
    console_controls::ConsoleBackend::set_cursor(&mut backend, original).unwrap();

    let window = Window::new(console.clone()).unwrap();
    assert_eq!(window.default_cursor_size(), 50);
    window.close(0);
    assert_eq!(console.cursor(), original);
}

#[tokio::test]
async fn wait_closed_yields_the_exit_code() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(4, 4))).unwrap();
    let handle = window.handle();

    let waiter = tokio::spawn(async move { handle.wait_closed().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    window.close(7);

    let code = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, 7);
    assert_eq!(window.wait_closed().await, 7);
}
