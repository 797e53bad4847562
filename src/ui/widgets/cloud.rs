use crate::cloud::mapper::{DataMapper, Rgb};
use crate::cloud::packer::{CanvasSize, PlacedToken, SpiralPacker};
use crate::config::Config;
use crate::error::RetryError;
use crate::feeds::{KeywordRecord, KeywordSource};
use crate::fetch::{Completion, FetchLifecycle, FetchState, Operation};
use crate::ui::widgets::Panel;
use futures::FutureExt;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Widget},
    Frame,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const HOVER_SCALE: f64 = 1.2;
pub const HOVER_OPACITY: f64 = 0.7;
/// Tokens at or above this font size render bold.
const BOLD_FONT_SIZE: f64 = 50.0;
const BACKGROUND: Rgb = Rgb::new(0, 0, 0);

pub type DatasetCompletion = Completion<(), Vec<KeywordRecord>>;

/// Visual effect of hovering, `NONE` at rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emphasis {
    pub scale: f64,
    pub opacity: f64,
}

impl Emphasis {
    pub const NONE: Emphasis = Emphasis {
        scale: 1.0,
        opacity: 1.0,
    };

    /// `level` runs from 0 (rest) to 1 (fully hovered).
    pub fn at(level: f64) -> Self {
        let level = level.clamp(0.0, 1.0);
        Self {
            scale: 1.0 + (HOVER_SCALE - 1.0) * level,
            opacity: 1.0 - (1.0 - HOVER_OPACITY) * level,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: f64,
    to: f64,
    started: Instant,
}

/// Hover target plus the in-progress enter/exit transitions.
#[derive(Debug, Clone)]
pub struct HoverState {
    duration: Duration,
    hovered: Option<usize>,
    transitions: HashMap<usize, Transition>,
}

impl HoverState {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            hovered: None,
            transitions: HashMap::new(),
        }
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn level(&self, index: usize, now: Instant) -> f64 {
        let Some(t) = self.transitions.get(&index) else {
            return 0.0;
        };
        if self.duration.is_zero() {
            return t.to;
        }
        let progress =
            (now.saturating_duration_since(t.started).as_secs_f64() / self.duration.as_secs_f64())
                .min(1.0);
        t.from + (t.to - t.from) * progress
    }

    /// Moves the hover to `index`, or off every token with `None`.
    pub fn set(&mut self, index: Option<usize>, now: Instant) {
        if self.hovered == index {
            return;
        }
        if let Some(old) = self.hovered.take() {
            self.animate(old, 0.0, now);
        }
        if let Some(new) = index {
            self.animate(new, 1.0, now);
        }
        self.hovered = index;
    }

    fn animate(&mut self, index: usize, to: f64, now: Instant) {
        let from = self.level(index, now);
        self.transitions.insert(
            index,
            Transition {
                from,
                to,
                started: now,
            },
        );
    }

    /// Forgets exit transitions that have finished.
    pub fn prune(&mut self, now: Instant) {
        let duration = self.duration;
        self.transitions.retain(|_, t| {
            t.to > 0.0 || now.saturating_duration_since(t.started) < duration
        });
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.transitions
            .values()
            .any(|t| now.saturating_duration_since(t.started) < self.duration)
    }

    pub fn reset(&mut self) {
        self.hovered = None;
        self.transitions.clear();
    }
}

/// Maps canvas coordinates (origin at the canvas center) onto terminal cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub area: Rect,
    pub canvas: CanvasSize,
}

impl Viewport {
    fn column(&self, x: f64) -> f64 {
        self.area.x as f64 + (x / self.canvas.width + 0.5) * self.area.width as f64
    }

    fn row(&self, y: f64) -> f64 {
        self.area.y as f64 + (y / self.canvas.height + 0.5) * self.area.height as f64
    }
}

/// A placed token projected to cells. Vertical glyphs stack their characters
/// downward from (`col`, `row`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub index: usize,
    pub col: u16,
    pub row: u16,
    pub text: String,
    pub vertical: bool,
}

impl Glyph {
    pub fn len(&self) -> u16 {
        self.text.chars().count() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn covers(&self, col: u16, row: u16) -> bool {
        if self.vertical {
            col == self.col && row >= self.row && row < self.row + self.len()
        } else {
            row == self.row && col >= self.col && col < self.col + self.len()
        }
    }
}

/// Projects a layout onto `viewport`. Depends only on its inputs, so the same
/// token list always paints the same cells.
pub fn paint(tokens: &[PlacedToken], viewport: Viewport) -> Vec<Glyph> {
    let area = viewport.area;
    if area.width == 0 || area.height == 0 {
        return Vec::new();
    }

    tokens
        .iter()
        .enumerate()
        .map(|(index, placed)| {
            let vertical = placed.is_vertical();
            let (extent, start, span) = if vertical {
                (area.height, area.y, viewport.row(placed.y))
            } else {
                (area.width, area.x, viewport.column(placed.x))
            };

            let text: String = placed.token.text.chars().take(extent as usize).collect();
            let len = text.chars().count() as u16;
            let offset = (span - len as f64 / 2.0).round() as i64;
            let lead = offset.clamp(start as i64, (start + extent - len) as i64) as u16;

            let (col, row) = if vertical {
                let col = viewport.column(placed.x).floor() as i64;
                let col = col.clamp(area.x as i64, (area.right() - 1) as i64) as u16;
                (col, lead)
            } else {
                let row = viewport.row(placed.y).floor() as i64;
                let row = row.clamp(area.y as i64, (area.bottom() - 1) as i64) as u16;
                (lead, row)
            };

            Glyph {
                index,
                col,
                row,
                text,
                vertical,
            }
        })
        .collect()
}

/// Topmost glyph under the cell, which is the last one painted.
pub fn hit_test(glyphs: &[Glyph], col: u16, row: u16) -> Option<usize> {
    glyphs
        .iter()
        .rev()
        .find(|g| g.covers(col, row))
        .map(|g| g.index)
}

pub fn token_style(placed: &PlacedToken, emphasis: Emphasis) -> Style {
    let color = placed.token.color.lerp(BACKGROUND, 1.0 - emphasis.opacity);
    let mut style = Style::default().fg(Color::Rgb(color.r, color.g, color.b));
    if placed.token.font_size >= BOLD_FONT_SIZE {
        style = style.add_modifier(Modifier::BOLD);
    }
    if emphasis.scale > 1.0 + (HOVER_SCALE - 1.0) / 2.0 {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

struct CloudCanvas<'a> {
    view: &'a CloudView,
    glyphs: Vec<Glyph>,
}

impl Widget for CloudCanvas<'_> {
    fn render(self, _area: Rect, buf: &mut Buffer) {
        for glyph in &self.glyphs {
            let placed = &self.view.layout[glyph.index];
            let style = token_style(placed, self.view.emphasis(glyph.index));
            if glyph.vertical {
                for (i, ch) in glyph.text.chars().enumerate() {
                    buf.set_string(glyph.col, glyph.row + i as u16, ch.to_string(), style);
                }
            } else {
                buf.set_string(glyph.col, glyph.row, &glyph.text, style);
            }
        }
    }
}

pub struct CloudView {
    title: String,
    dataset: FetchLifecycle<(), Vec<KeywordRecord>>,
    mapper: DataMapper,
    packer: SpiralPacker,
    layout: Vec<PlacedToken>,
    dropped: usize,
    hover: HoverState,
    canvas_area: Rect,
    clock: Instant,
}

impl CloudView {
    pub fn new(source: Arc<dyn KeywordSource>, config: &Config) -> Self {
        let operation: Operation<(), Vec<KeywordRecord>> = Arc::new(move |_: ()| {
            let source = source.clone();
            async move { source.fetch_dataset().await }.boxed()
        });

        Self {
            title: "Trending Stock Keywords".to_string(),
            dataset: FetchLifecycle::new("dataset", operation),
            mapper: DataMapper::from_config(&config.cloud),
            packer: SpiralPacker::from_config(&config.cloud),
            layout: Vec::new(),
            dropped: 0,
            hover: HoverState::new(Duration::from_millis(config.ui.hover_transition_ms)),
            canvas_area: Rect::default(),
            clock: Instant::now(),
        }
    }

    /// First load. Does nothing if the dataset was already requested.
    pub fn mount(&mut self) {
        if matches!(self.state(), FetchState::Idle) {
            self.reload();
        }
    }

    pub fn reload(&mut self) {
        self.dataset.trigger(());
        self.rebuild();
    }

    pub fn retry(&mut self) -> Result<(), RetryError> {
        self.dataset.retry(())?;
        self.rebuild();
        Ok(())
    }

    pub async fn next_completion(&mut self) -> Option<DatasetCompletion> {
        self.dataset.next_completion().await
    }

    /// Applies a finished dataset fetch and relayouts when it took effect.
    pub fn on_completion(&mut self, completion: DatasetCompletion) -> bool {
        let applied = self.dataset.settle(completion);
        if applied {
            self.rebuild();
        }
        applied
    }

    pub fn state(&self) -> &FetchState<Vec<KeywordRecord>> {
        self.dataset.state(&())
    }

    /// Throws away the previous layout and, on success, packs the new snapshot.
    fn rebuild(&mut self) {
        self.hover.reset();
        self.layout.clear();
        self.dropped = 0;

        if let FetchState::Success { value, .. } = self.dataset.state(&()) {
            let tokens = self.mapper.map(value);
            let result = self.packer.pack(&tokens);
            if !result.is_complete() {
                tracing::warn!(
                    dropped = result.dropped.len(),
                    total = tokens.len(),
                    "some keywords did not fit on the canvas"
                );
            }
            self.dropped = result.dropped.len();
            self.layout = result.placed;
        }
    }

    pub fn tokens(&self) -> &[PlacedToken] {
        &self.layout
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Area of the cloud panel; the canvas is derived from it.
    pub fn set_area(&mut self, area: Rect) {
        self.canvas_area = Self::canvas_area(area);
    }

    fn canvas_area(area: Rect) -> Rect {
        let inner = Block::default().borders(Borders::ALL).inner(area);
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner)[0]
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            area: self.canvas_area,
            canvas: self.packer.canvas,
        }
    }

    pub fn glyphs(&self) -> Vec<Glyph> {
        paint(&self.layout, self.viewport())
    }

    pub fn tick(&mut self, now: Instant) {
        self.clock = now;
        self.hover.prune(now);
    }

    pub fn is_animating(&self) -> bool {
        self.hover.is_animating(self.clock)
    }

    pub fn emphasis(&self, index: usize) -> Emphasis {
        Emphasis::at(self.hover.level(index, self.clock))
    }

    pub fn hovered(&self) -> Option<&PlacedToken> {
        self.hover.hovered().and_then(|i| self.layout.get(i))
    }

    /// Pointer moved to a cell. Only changes local presentation state.
    pub fn hover_at(&mut self, col: u16, row: u16) {
        let target = hit_test(&self.glyphs(), col, row);
        self.hover.set(target, self.clock);
    }

    /// Pointer clicked a cell. Returns the keyword to open, once per click.
    pub fn click_at(&self, col: u16, row: u16) -> Option<String> {
        hit_test(&self.glyphs(), col, row).map(|i| self.layout[i].token.text.clone())
    }

    pub fn focus_next(&mut self) {
        self.step_focus(1);
    }

    pub fn focus_prev(&mut self) {
        self.step_focus(-1);
    }

    fn step_focus(&mut self, delta: isize) {
        if self.layout.is_empty() {
            return;
        }
        let len = self.layout.len() as isize;
        let next = match self.hover.hovered() {
            Some(i) => (i as isize + delta).rem_euclid(len),
            None if delta >= 0 => 0,
            None => len - 1,
        };
        self.hover.set(Some(next as usize), self.clock);
    }

    /// Keyboard equivalent of clicking the hovered token.
    pub fn activate(&self) -> Option<String> {
        self.hovered().map(|p| p.token.text.clone())
    }

    fn render_message(&self, frame: &mut Frame, area: Rect, block: Block, lines: Vec<Line>) {
        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }
}

impl Panel for CloudView {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let border_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };

        let title = match self.state() {
            FetchState::Success { fetched_at, .. } => format!(
                " {} (updated {}) ",
                self.title,
                fetched_at.with_timezone(&chrono::Local).format("%H:%M:%S")
            ),
            _ => format!(" {} ", self.title),
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);

        match self.state() {
            FetchState::Idle | FetchState::Loading => {
                let loading = List::new(vec![ListItem::new("Loading keywords...")]).block(block);
                frame.render_widget(loading, area);
            }
            FetchState::Error { message } => {
                let lines = vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        "Failed to load keywords",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(message.as_str()),
                    Line::from(""),
                    Line::from(Span::styled(
                        "Press r to retry",
                        Style::default().fg(Color::DarkGray),
                    )),
                ];
                self.render_message(frame, area, block, lines);
            }
            FetchState::Success { value, .. } if self.layout.is_empty() => {
                let text = if value.is_empty() {
                    "No keywords to display"
                } else {
                    "No keyword fits on the canvas"
                };
                self.render_message(frame, area, block, vec![Line::from(""), Line::from(text)]);
            }
            FetchState::Success { .. } => {
                let inner = block.inner(area);
                frame.render_widget(block, area);

                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(1), Constraint::Length(1)])
                    .split(inner);

                let canvas = CloudCanvas {
                    view: self,
                    glyphs: paint(
                        &self.layout,
                        Viewport {
                            area: chunks[0],
                            canvas: self.packer.canvas,
                        },
                    ),
                };
                frame.render_widget(canvas, chunks[0]);

                let status = match self.hovered() {
                    Some(placed) => Line::from(Span::styled(
                        placed.token.tooltip(),
                        Style::default().fg(Color::Cyan),
                    )),
                    None => {
                        let mut hint = String::from("Click a keyword for a detailed report");
                        if self.dropped > 0 {
                            hint.push_str(&format!(" | {} hidden (no room)", self.dropped));
                        }
                        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
                    }
                };
                frame.render_widget(Paragraph::new(status), chunks[1]);
            }
        }
    }
}
