use crate::kernels::{KernelKind, PointerEvent, ZOOM_STEP};
use crate::surface::Viewport;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum InputEvent {
    Key { key: KeyCode, mods: KeyModifiers },
    Pointer(PointerEvent),
}

/// Selector-level actions, applied when the mounted kernel did not consume a key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Action {
    Quit,
    Cycle(i32),
    Select(KernelKind),
    ToggleHud,
    Zoom(f32),
}

pub(crate) fn collect_input_nonblocking(
    max_frame_time: Duration,
    viewport: &Viewport,
) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        let ev = match event::read()? {
            Event::Key(k) if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat => {
                Some(InputEvent::Key {
                    key: k.code,
                    mods: k.modifiers,
                })
            }
            Event::Mouse(m) => map_mouse(viewport, m).map(InputEvent::Pointer),
            Event::FocusLost => Some(InputEvent::Pointer(PointerEvent::Leave)),
            _ => None,
        };
        if let Some(ev) = ev {
            out.push(ev);
            if out.len() >= 32 {
                break;
            }
        }
    }
    Ok(out)
}

/// Translates a terminal mouse report into surface pixels at the cell centre.
pub(crate) fn map_mouse(viewport: &Viewport, m: MouseEvent) -> Option<PointerEvent> {
    let (x, y) = viewport.cell_center(m.column, m.row);
    match m.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(PointerEvent::Down { x, y }),
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
            Some(PointerEvent::Move { x, y })
        }
        MouseEventKind::Up(MouseButton::Left) => Some(PointerEvent::Up),
        _ => None,
    }
}

pub(crate) fn map_global_key(key: KeyCode, mods: KeyModifiers) -> Option<Action> {
    if matches!(key, KeyCode::Char('c') | KeyCode::Char('C')) && mods.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Tab => Some(Action::Cycle(1)),
        KeyCode::BackTab => Some(Action::Cycle(-1)),
        KeyCode::Char(d @ '1'..='4') => {
            let i = d as usize - '1' as usize;
            Some(Action::Select(KernelKind::ALL[i]))
        }
        KeyCode::Char('h') | KeyCode::Char('H') => Some(Action::ToggleHud),
        KeyCode::Char('>') => Some(Action::Zoom(ZOOM_STEP)),
        KeyCode::Char('<') => Some(Action::Zoom(1.0 / ZOOM_STEP)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn digits_select_kernels_in_cycle_order() {
        let none = KeyModifiers::NONE;
        assert_eq!(map_global_key(KeyCode::Char('1'), none), Some(Action::Select(KernelKind::Video)));
        assert_eq!(map_global_key(KeyCode::Char('4'), none), Some(Action::Select(KernelKind::Fire)));
        assert_eq!(map_global_key(KeyCode::Char('5'), none), None);
        assert_eq!(map_global_key(KeyCode::BackTab, none), Some(Action::Cycle(-1)));
    }

    #[test]
    fn quit_keys() {
        assert_eq!(map_global_key(KeyCode::Esc, KeyModifiers::NONE), Some(Action::Quit));
        assert_eq!(map_global_key(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Action::Quit));
        assert_eq!(map_global_key(KeyCode::Char('c'), KeyModifiers::NONE), None);
    }

    #[test]
    fn mouse_reports_land_on_cell_centres() {
        let viewport = Viewport::from_terminal(10, 5, 0, 0);
        assert_eq!(
            map_mouse(&viewport, mouse(MouseEventKind::Down(MouseButton::Left), 2, 1)),
            Some(PointerEvent::Down { x: 20.0, y: 24.0 })
        );
        assert_eq!(
            map_mouse(&viewport, mouse(MouseEventKind::Moved, 0, 0)),
            Some(PointerEvent::Move { x: 4.0, y: 8.0 })
        );
        assert_eq!(
            map_mouse(&viewport, mouse(MouseEventKind::Up(MouseButton::Left), 0, 0)),
            Some(PointerEvent::Up)
        );
        assert_eq!(map_mouse(&viewport, mouse(MouseEventKind::ScrollUp, 0, 0)), None);
    }
}
