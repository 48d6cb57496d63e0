mod support;

use console_controls::{
    Button, ControlKeyStates, MemoryConsole, Panel, Rect, Size, TextBlock, VirtualKey, Window,
};
use support::{key, shift_tab, tab, window_lock};

fn button(window: &Window, caption: &str, x: i32) -> console_controls::Control {
    window
        .control(Button::new(caption))
        .area(Rect::new(x, 0, 6, 3))
}

#[test]
fn tab_follows_tab_order_and_wraps() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(40, 10))).unwrap();
    let first = window.add(button(&window, "a", 0).tab_order(2)).unwrap();
    let second = window.add(button(&window, "b", 6).tab_order(1)).unwrap();
    let panel = window
        .add(
            window
                .control(Panel::new())
                .area(Rect::new(0, 4, 20, 5))
                .tab_order(3),
        )
        .unwrap();
    let nested = window
        .add_to(
            panel,
            window
                .control(TextBlock::new("text"))
                .area(Rect::new(0, 0, 10, 2))
                .tab_order(0),
        )
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        window.dispatch(tab()).unwrap();
        seen.push(window.focused_control().unwrap());
    }
    assert_eq!(seen, vec![second, first, nested, second]);

    window.dispatch(shift_tab()).unwrap();
    assert_eq!(window.focused_control(), Some(nested));
}

#[test]
fn tab_skips_disabled_hidden_and_non_tab_stops() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(40, 10))).unwrap();
    let a = window.add(button(&window, "a", 0)).unwrap();
    let b = window.add(button(&window, "b", 6).enabled(false)).unwrap();
    let c = window.add(button(&window, "c", 12).visible(false)).unwrap();
    let d = window.add(button(&window, "d", 18).tab_stop(false)).unwrap();
    let e = window.add(button(&window, "e", 24)).unwrap();

    window.dispatch(tab()).unwrap();
    assert_eq!(window.focused_control(), Some(a));
    window.dispatch(tab()).unwrap();
    assert_eq!(window.focused_control(), Some(e));

    // Not reachable with Tab, but still focusable directly.
    window.set_focused_control(Some(d)).unwrap();
    assert!(window.set_focused_control(Some(b)).is_err());
    assert!(window.set_focused_control(Some(c)).is_err());
    assert_eq!(window.focused_control(), Some(d));
}

#[test]
fn focus_changes_when_focused_control_goes_away() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(40, 10))).unwrap();
    let a = window.add(button(&window, "a", 0)).unwrap();
    let b = window.add(button(&window, "b", 6)).unwrap();

    window.set_focused_control(Some(a)).unwrap();
    window.set_enabled_control(a, false).unwrap();
    assert_eq!(window.focused_control(), None);

    window.set_focused_control(Some(b)).unwrap();
    let detached = window.remove(b).unwrap();
    assert_eq!(window.focused_control(), None);
    assert!(!detached.state().focused);
}

#[test]
fn handled_keys_do_not_move_focus() {
    let _lock = window_lock();
    let window = Window::new(MemoryConsole::new(Size::new(40, 10))).unwrap();
    window.add(button(&window, "a", 0)).unwrap();
    window
        .events(|events| {
            events.key.subscribe(|event| {
                if event.virtual_key == VirtualKey::TAB && event.modifiers.is_empty() {
                    event.handled = true;
                }
            });
        })
        .unwrap();

    window.dispatch(tab()).unwrap();
    assert_eq!(window.focused_control(), None);

    window
        .dispatch(key(VirtualKey::TAB, ControlKeyStates::LEFT_ALT))
        .unwrap();
    assert_eq!(window.focused_control(), None);
}
