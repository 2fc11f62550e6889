//! Backend-neutral drawing instructions.
//!
//! Views never touch pixels. They emit [`DrawCommand`]s onto a [`Surface`];
//! the host decides how to present them. [`DrawList`] is the recording
//! surface used by the pipeline and can be flattened to SVG.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Color {
    Rgb(u8, u8, u8),
    /// Hue in degrees, saturation and lightness in percent.
    Hsl(f32, f32, f32),
}

impl Color {
    pub const WHITE: Color = Color::Rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::Rgb(0x00, 0x00, 0x00);
    pub const LABEL: Color = Color::Rgb(0x66, 0x66, 0x66);
    pub const ACCENT: Color = Color::Rgb(0, 120, 255);
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Rgb(r, g, b) => write!(f, "rgb({r}, {g}, {b})"),
            Color::Hsl(h, s, l) => write!(f, "hsl({h}, {s}%, {l}%)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// Fill the whole surface.
    Clear { color: Color },
    Polyline {
        points: Vec<Point>,
        stroke: Color,
        line_width: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Color,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        size: f32,
        color: Color,
    },
}

/// Rendering target for a single view.
pub trait Surface {
    /// Resets the surface to new dimensions, discarding previous content.
    fn resize(&mut self, width: f32, height: f32);

    fn size(&self) -> (f32, f32);

    /// Starts a new frame, discarding the previous frame's commands.
    fn begin_frame(&mut self);

    fn submit(&mut self, command: DrawCommand);

    fn text(&mut self, x: f32, y: f32, text: &str, size: f32) {
        self.submit(DrawCommand::Text {
            x,
            y,
            text: text.to_string(),
            size,
            color: Color::LABEL,
        });
    }
}

/// Surface that records the commands of the latest frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
    resets: u64,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of times the surface dimensions were reset.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Text of every label drawn this frame, in draw order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        for command in &self.commands {
            let _ = match command {
                DrawCommand::Clear { color } => writeln!(
                    svg,
                    r#"  <rect x="0" y="0" width="{}" height="{}" fill="{color}"/>"#,
                    self.width, self.height
                ),
                DrawCommand::Polyline {
                    points,
                    stroke,
                    line_width,
                } => {
                    let coords: Vec<String> =
                        points.iter().map(|p| format!("{},{}", p.x, p.y)).collect();
                    writeln!(
                        svg,
                        r#"  <polyline points="{}" fill="none" stroke="{stroke}" stroke-width="{line_width}"/>"#,
                        coords.join(" ")
                    )
                }
                DrawCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                } => writeln!(
                    svg,
                    r#"  <rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{fill}"/>"#
                ),
                DrawCommand::Text {
                    x,
                    y,
                    text,
                    size,
                    color,
                } => writeln!(
                    svg,
                    r#"  <text x="{x}" y="{y}" font-family="Arial" font-size="{size}" fill="{color}">{}</text>"#,
                    escape_xml(text)
                ),
            };
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl Surface for DrawList {
    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.commands.clear();
        self.resets += 1;
    }

    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn submit(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
