//! TUI rendering for the 88-key visualizer
//!
//! The screen is split into a one-line control bar at the top, the beam
//! viewport in the middle and the keyboard at the bottom. White keys get an
//! equal integer number of columns; black keys straddle the boundary
//! between two white keys and cover the top three quarters of the keyboard
//! rows, with the two touch regions underneath. Beams are drawn with
//! half-block characters so they move in half-row steps.

use crate::beam::{Beam, KeyRect};
use crate::config::Theme;
use crate::controls::{Controls, Toggle};
use crate::layout::{note_name, Key, KeyGeometry, KeyKind, WHITE_KEY_COUNT};
use crate::piano::PianoKeyboard;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Widget, Wrap};

/// Smallest usable terminal height
pub const MIN_HEIGHT: u16 = 8;

/// Smallest usable terminal width (one column per white key)
pub const MIN_WIDTH: u16 = WHITE_KEY_COUNT as u16;

const MIN_KEYBOARD_ROWS: u16 = 4;
const MAX_KEYBOARD_ROWS: u16 = 10;

/// Screen regions and key geometry for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenLayout {
    /// Whole drawing area
    pub area: Rect,
    /// Control bar
    pub status: Rect,
    /// Beam viewport, aligned with the keyboard columns
    pub beams: Rect,
    /// Keyboard
    pub keyboard: Rect,
    pub white_width: u16,
    pub black_width: u16,
    /// Keyboard rows covered by black keys; the rest hold touch regions
    pub black_rows: u16,
    pub units_per_row: f32,
}

impl ScreenLayout {
    /// Split `area`, or None if the keyboard does not fit
    pub fn compute(area: Rect, units_per_row: f32) -> Option<Self> {
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            return None;
        }

        let white_width = (area.width / MIN_WIDTH).max(1);
        let black_width = ((white_width as u32 * 52 / 80) as u16).max(1);
        let keyboard_width = white_width * MIN_WIDTH;
        let keyboard_rows = (area.height / 4).clamp(MIN_KEYBOARD_ROWS, MAX_KEYBOARD_ROWS);
        let black_rows = (keyboard_rows * 3 / 4).max(1);
        let x = area.x + (area.width - keyboard_width) / 2;

        let status = Rect::new(area.x, area.y, area.width, 1);
        let keyboard = Rect::new(x, area.bottom() - keyboard_rows, keyboard_width, keyboard_rows);
        let beams = Rect::new(x, status.bottom(), keyboard_width, keyboard.y - status.bottom());

        Some(Self {
            area,
            status,
            beams,
            keyboard,
            white_width,
            black_width,
            black_rows,
            units_per_row,
        })
    }

    /// Column offset and width of a key, relative to the keyboard's left edge
    pub fn key_span(&self, key: &Key) -> (u16, u16) {
        match key.kind {
            KeyKind::White => (key.white_index as u16 * self.white_width, self.white_width),
            KeyKind::Black => {
                let geometry = KeyGeometry {
                    white_width: self.white_width as f32,
                    black_width: self.black_width as f32,
                };
                let (left, _) = geometry.span(key);
                let left = (left.floor().max(0.0) as u16).min(self.keyboard.width - self.black_width);
                (left, self.black_width)
            }
        }
    }

    /// On-screen rectangle of a key in beam coordinates
    pub fn key_rect(&self, key: &Key) -> KeyRect {
        let (offset, width) = self.key_span(key);
        KeyRect {
            left: (self.keyboard.x + offset) as f32,
            width: width as f32,
            baseline: self.baseline(),
        }
    }

    /// Top edge of the keyboard, in units above the bottom of the area
    pub fn baseline(&self) -> f32 {
        self.keyboard.height as f32 * self.units_per_row
    }

    /// Height of the whole area in units
    pub fn viewport_height(&self) -> f32 {
        self.area.height as f32 * self.units_per_row
    }
}

/// Record every key's rectangle and the viewport height on the keyboard
pub fn mount_keys(keyboard: &PianoKeyboard, screen: &ScreenLayout) {
    for key in keyboard.layout().keys() {
        keyboard.mount(key.id, screen.key_rect(key));
    }
    keyboard.set_viewport_height(screen.viewport_height());
}

/// Half-row occupancy grid for the beam viewport
struct BeamCanvas {
    area: Rect,
    /// Units at the bottom edge of the canvas
    floor: f32,
    half_row: f32,
    /// Two cells per terminal cell: [upper, lower]
    cells: Vec<[bool; 2]>,
}

impl BeamCanvas {
    fn new(area: Rect, floor: f32, units_per_row: f32) -> Self {
        Self {
            area,
            floor,
            half_row: units_per_row / 2.0,
            cells: vec![[false; 2]; area.width as usize * area.height as usize],
        }
    }

    fn paint(&mut self, beam: &Beam) {
        let origin = beam.origin();
        let left = origin.left.max(0.0) as u16;
        let right = (origin.left + origin.width).max(0.0) as u16;
        let (bottom, top) = (beam.bottom(), beam.top());

        for row in 0..self.area.height {
            // Row 0 sits directly on the keyboard
            let row_floor = self.floor + row as f32 * 2.0 * self.half_row;
            let lower_mid = row_floor + self.half_row / 2.0;
            let upper_mid = lower_mid + self.half_row;
            let lower = bottom <= lower_mid && lower_mid < top;
            let upper = bottom <= upper_mid && upper_mid < top;
            if !lower && !upper {
                continue;
            }
            let y = self.area.height - 1 - row;
            for x in left.max(self.area.x)..right.min(self.area.right()) {
                let index = y as usize * self.area.width as usize + (x - self.area.x) as usize;
                self.cells[index][0] |= upper;
                self.cells[index][1] |= lower;
            }
        }
    }

    fn render(&self, buf: &mut Buffer, color: Color) {
        let style = Style::default().fg(color);
        for (index, [upper, lower]) in self.cells.iter().enumerate() {
            let symbol = match (*upper, *lower) {
                (true, true) => "█",
                (true, false) => "▀",
                (false, true) => "▄",
                (false, false) => continue,
            };
            let x = self.area.x + (index % self.area.width as usize) as u16;
            let y = self.area.y + (index / self.area.width as usize) as u16;
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(symbol).set_style(style);
            }
        }
    }
}

/// Keyboard and beam widget for rendering in ratatui
pub struct PianoWidget<'a> {
    keyboard: &'a PianoKeyboard,
    screen: ScreenLayout,
    controls: Option<&'a Controls>,
    octave: Option<String>,
    theme: Theme,
}

impl<'a> PianoWidget<'a> {
    /// Create a new widget for an already mounted keyboard
    pub fn new(keyboard: &'a PianoKeyboard, screen: ScreenLayout) -> Self {
        Self {
            keyboard,
            screen,
            controls: None,
            octave: None,
            theme: Theme::default(),
        }
    }

    /// Show the Listen/Record toggles
    pub fn controls(mut self, controls: &'a Controls) -> Self {
        self.controls = Some(controls);
        self
    }

    /// Show the capture octave
    pub fn octave(mut self, octave: impl Into<String>) -> Self {
        self.octave = Some(octave.into());
        self
    }

    /// Set the theme
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    fn render_beams(&self, buf: &mut Buffer) {
        let screen = &self.screen;
        let floor = screen.baseline();
        let mut canvas = BeamCanvas::new(screen.beams, floor, screen.units_per_row);
        for key in self.keyboard.components() {
            for beam in key.beams() {
                canvas.paint(beam);
            }
        }
        canvas.render(buf, self.theme.beam());
    }

    fn render_keys(&self, buf: &mut Buffer) {
        let screen = &self.screen;
        let area = screen.keyboard;
        let active = self.theme.active();
        let white = self.theme.white_key();

        for key in self.keyboard.components() {
            let (offset, width) = screen.key_span(key.key());
            let x = area.x + offset;
            match key.key().kind {
                KeyKind::White => {
                    let bg = if key.is_active() { active } else { white };
                    fill(buf, Rect::new(x, area.y, width, area.height), Style::default().bg(bg));
                    if width >= 2 && key.key().white_index > 0 {
                        for y in area.top()..area.bottom() {
                            if let Some(cell) = buf.cell_mut((x, y)) {
                                cell.set_symbol("▏").set_fg(Color::Black);
                            }
                        }
                    }
                    if self.theme.show_note_names && width >= 3 && key.id() % 12 == 0 {
                        let label: String = note_name(key.id()).chars().take(width as usize).collect();
                        buf.set_string(x, area.bottom() - 1, label, Style::default().fg(Color::DarkGray).bg(bg));
                    }
                }
                KeyKind::Black => {}
            }
        }

        // Black keys go on top of the white keys
        for key in self.keyboard.components() {
            if key.key().kind != KeyKind::Black {
                continue;
            }
            let (offset, width) = screen.key_span(key.key());
            let x = area.x + offset;
            let bg = if key.is_active() { active } else { self.theme.black_key() };
            fill(buf, Rect::new(x, area.y, width, screen.black_rows), Style::default().bg(bg));

            let Some(touch) = key.touch_regions() else {
                continue;
            };
            let left = if touch.left.is_active() { active } else { white };
            let right = if touch.right.is_active() { active } else { white };
            let touch_area = Rect::new(x, area.y + screen.black_rows, width, area.height - screen.black_rows);
            render_touch_regions(buf, touch_area, left, right);
        }
    }

    fn render_status(&self, buf: &mut Buffer) {
        let mut spans: Vec<Span> = Vec::new();
        if let Some(controls) = self.controls {
            spans.extend(toggle_spans("Listen", controls.listen(), controls.listen_enabled()));
            spans.push(Span::raw("  "));
            spans.extend(toggle_spans("Record", controls.record(), controls.record_enabled()));
            if controls.scheduled_play().is_some() {
                spans.push(Span::styled(" replay pending", Style::default().fg(Color::Yellow)));
            }
            spans.push(Span::raw("  "));
        }
        if let Some(octave) = &self.octave {
            spans.push(Span::styled(format!("[{}] ", octave), Style::default().fg(Color::Yellow)));
        }
        let active = self.keyboard.active_keys();
        let playing = if active.is_empty() {
            "-".to_string()
        } else {
            active.iter().map(|id| note_name(*id)).collect::<Vec<_>>().join(" ")
        };
        spans.push(Span::styled("Playing: ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(playing, Style::default().fg(self.theme.active()).add_modifier(Modifier::BOLD)));

        let status = self.screen.status;
        buf.set_line(status.x, status.y, &Line::from(spans), status.width);

        if self.theme.show_help {
            let help = help_line(self.controls.is_some());
            let width = help.width() as u16;
            if width < status.width {
                buf.set_line(status.right() - width, status.y, &help, width);
            }
        }
    }
}

impl<'a> Widget for PianoWidget<'a> {
    fn render(self, _area: Rect, buf: &mut Buffer) {
        self.render_beams(buf);
        self.render_keys(buf);
        self.render_status(buf);
    }
}

/// Lay out the frame, mount the keys and draw everything.
///
/// Returns false (after drawing a notice and unmounting the keys) when the
/// terminal is too small for the keyboard.
pub fn render_piano(
    frame: &mut Frame,
    keyboard: &PianoKeyboard,
    controls: &Controls,
    octave: &str,
    theme: &Theme,
    units_per_row: f32,
) -> bool {
    let area = frame.area();
    let Some(screen) = ScreenLayout::compute(area, units_per_row) else {
        keyboard.unmount_all();
        let notice = Paragraph::new(format!(
            "Terminal too small ({}x{}), need at least {}x{}",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        ))
        .style(Style::default().fg(theme.border()))
        .wrap(Wrap { trim: true });
        frame.render_widget(notice, area);
        return false;
    };

    mount_keys(keyboard, &screen);
    let widget = PianoWidget::new(keyboard, screen)
        .controls(controls)
        .octave(octave)
        .theme(theme.clone());
    frame.render_widget(widget, area);
    true
}

fn fill(buf: &mut Buffer, area: Rect, style: Style) {
    let area = area.intersection(buf.area);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(" ").set_style(style);
            }
        }
    }
}

/// Left half mirrors `left`, right half mirrors `right`; an odd middle
/// column is split with a half block
fn render_touch_regions(buf: &mut Buffer, area: Rect, left: Color, right: Color) {
    let half = area.width / 2;
    for y in area.top()..area.bottom() {
        for (i, x) in (area.left()..area.right()).enumerate() {
            let i = i as u16;
            let Some(cell) = buf.cell_mut((x, y)) else {
                continue;
            };
            if area.width % 2 == 1 && i == half {
                cell.set_symbol("▌").set_fg(left).set_bg(right);
            } else if i < half {
                cell.set_symbol(" ").set_bg(left);
            } else {
                cell.set_symbol(" ").set_bg(right);
            }
        }
    }
}

fn toggle_spans(label: &str, toggle: Toggle, enabled: bool) -> Vec<Span<'static>> {
    let color = if !enabled {
        Color::DarkGray
    } else if toggle.is_pending() {
        Color::Yellow
    } else if toggle.is_on() {
        Color::Green
    } else {
        Color::Red
    };
    let state = if toggle.is_on() { "ON" } else { "OFF" };
    vec![
        Span::styled(format!("{}:", label), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("[{}]", state),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ]
}

fn help_line(with_controls: bool) -> Line<'static> {
    let key = Style::default().fg(Color::White);
    let text = Style::default().fg(Color::DarkGray);
    let mut spans = Vec::new();
    if with_controls {
        spans.extend([
            Span::styled("F1 ", key),
            Span::styled("listen  ", text),
            Span::styled("F2 ", key),
            Span::styled("record  ", text),
            Span::styled("←/→ ", key),
            Span::styled("octave  ", text),
        ]);
    }
    spans.extend([Span::styled("Esc ", key), Span::styled("quit ", text)]);
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::BeamSettings;
    use crate::event::PianoEvent;
    use std::time::Instant;

    fn screen(width: u16, height: u16) -> ScreenLayout {
        ScreenLayout::compute(Rect::new(0, 0, width, height), 16.0).unwrap()
    }

    fn symbol(buf: &Buffer, x: u16, y: u16) -> &str {
        buf.cell((x, y)).unwrap().symbol()
    }

    #[test]
    fn test_too_small() {
        assert!(ScreenLayout::compute(Rect::new(0, 0, 51, 40), 16.0).is_none());
        assert!(ScreenLayout::compute(Rect::new(0, 0, 200, 7), 16.0).is_none());
    }

    #[test]
    fn test_regions() {
        let s = screen(160, 40);
        assert_eq!(s.white_width, 3);
        assert_eq!(s.black_width, 1);
        assert_eq!(s.keyboard, Rect::new(2, 30, 156, 10));
        assert_eq!(s.black_rows, 7);
        assert_eq!(s.status, Rect::new(0, 0, 160, 1));
        assert_eq!(s.beams, Rect::new(2, 1, 156, 29));
        assert_eq!(s.baseline(), 160.0);
        assert_eq!(s.viewport_height(), 640.0);
    }

    #[test]
    fn test_keyboard_rows_clamped() {
        assert_eq!(screen(52, 8).keyboard.height, 4);
        assert_eq!(screen(52, 100).keyboard.height, 10);
    }

    #[test]
    fn test_key_spans() {
        let s = screen(208, 40);
        assert_eq!(s.white_width, 4);
        assert_eq!(s.black_width, 2);
        let keyboard = PianoKeyboard::default();
        let layout = keyboard.layout();
        // A0, A#0, B0
        assert_eq!(s.key_span(layout.get(21).unwrap()), (0, 4));
        assert_eq!(s.key_span(layout.get(22).unwrap()), (3, 2));
        assert_eq!(s.key_span(layout.get(23).unwrap()), (4, 4));
        // C#1 sits between C1 (white 2) and D1 (white 3)
        assert_eq!(s.key_span(layout.get(25).unwrap()), (11, 2));
        // C8 is the last white key
        assert_eq!(s.key_span(layout.get(108).unwrap()), (204, 4));
    }

    #[test]
    fn test_black_keys_inside_keyboard_at_one_column() {
        let s = screen(52, 20);
        let keyboard = PianoKeyboard::default();
        for key in keyboard.layout().black_keys() {
            let (offset, width) = s.key_span(key);
            assert!(offset + width <= s.keyboard.width);
        }
    }

    #[test]
    fn test_mount_keys() {
        let s = screen(104, 32);
        let keyboard = PianoKeyboard::default();
        mount_keys(&keyboard, &s);
        assert_eq!(keyboard.viewport_height(), 32.0 * 16.0);
        let rect = keyboard.key(60).unwrap().rect().unwrap();
        assert_eq!(rect.left, 46.0);
        assert_eq!(rect.width, 2.0);
        assert_eq!(rect.baseline, 8.0 * 16.0);
    }

    #[test]
    fn test_render_active_keys_and_touch_regions() {
        let area = Rect::new(0, 0, 104, 32);
        let s = ScreenLayout::compute(area, 16.0).unwrap();
        let mut keyboard = PianoKeyboard::new(BeamSettings::default());
        mount_keys(&keyboard, &s);
        keyboard.dispatch(PianoEvent::press(60, 100), Instant::now());

        let theme = Theme::default();
        let mut buf = Buffer::empty(area);
        PianoWidget::new(&keyboard, s).theme(theme.clone()).render(area, &mut buf);

        let y = s.keyboard.bottom() - 1;
        let (c4, _) = s.key_span(keyboard.layout().get(60).unwrap());
        assert_eq!(buf.cell((s.keyboard.x + c4, y)).unwrap().bg, theme.active());
        let (d4, _) = s.key_span(keyboard.layout().get(62).unwrap());
        assert_eq!(buf.cell((s.keyboard.x + d4, y)).unwrap().bg, theme.white_key());

        // C#4's left touch region mirrors C4
        let (cs4, width) = s.key_span(keyboard.layout().get(61).unwrap());
        assert_eq!(width, 1);
        let cell = buf.cell((s.keyboard.x + cs4, y)).unwrap();
        assert_eq!(cell.symbol(), "▌");
        assert_eq!(cell.fg, theme.active());
        assert_eq!(cell.bg, theme.white_key());
        let top = buf.cell((s.keyboard.x + cs4, s.keyboard.y)).unwrap();
        assert_eq!(top.bg, theme.black_key());
    }

    #[test]
    fn test_render_new_beam_as_lower_half() {
        let area = Rect::new(0, 0, 104, 32);
        let s = ScreenLayout::compute(area, 16.0).unwrap();
        let mut keyboard = PianoKeyboard::default();
        mount_keys(&keyboard, &s);
        keyboard.dispatch(PianoEvent::press(60, 100), Instant::now());

        let mut buf = Buffer::empty(area);
        PianoWidget::new(&keyboard, s).render(area, &mut buf);

        let (offset, _) = s.key_span(keyboard.layout().get(60).unwrap());
        let x = s.keyboard.x + offset;
        let y = s.keyboard.y - 1;
        // Height 10 covers the lower half (midpoint 4) but not the upper (12)
        assert_eq!(symbol(&buf, x, y), "▄");
        assert_eq!(symbol(&buf, x + 1, y), "▄");
        assert_eq!(symbol(&buf, x + 2, y), " ");
        assert_eq!(symbol(&buf, x, y - 1), " ");
    }

    #[test]
    fn test_render_status_line() {
        let area = Rect::new(0, 0, 104, 32);
        let s = ScreenLayout::compute(area, 16.0).unwrap();
        let mut keyboard = PianoKeyboard::default();
        keyboard.dispatch(PianoEvent::press(64, 100), Instant::now());
        let controls = Controls::default();

        let mut buf = Buffer::empty(area);
        PianoWidget::new(&keyboard, s).controls(&controls).octave("C3").render(area, &mut buf);

        let line: String = (0..area.width).map(|x| symbol(&buf, x, 0)).collect();
        assert!(line.starts_with("Listen:[OFF]  Record:[OFF]  [C3] Playing: E4"));
        assert!(line.trim_end().ends_with("Esc quit"));
    }
}
