// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-demand screenshot rendering (C8): replay the buffer through a fresh
//! headless emulator and render the resulting cell grid to SVG.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::identity::{RouteKey, SessionId};
use crate::screen::Screen;
use crate::session::Connector;

use super::ws::DISCONNECTED_GEOMETRY;
use super::GatewayState;

const DEFAULT_WIDTH: u16 = 132;
const DEFAULT_HEIGHT: u16 = 45;

const CELL_WIDTH: u32 = 8;
const CELL_HEIGHT: u32 = 16;
const FONT_SIZE: u32 = 14;

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenshotQuery {
    pub route_key: String,
    pub width: Option<u16>,
}

/// `GET /screenshot?route_key=<k>[&width=<n>]`.
pub async fn screenshot_handler(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ScreenshotQuery>,
) -> impl IntoResponse {
    let route_key = RouteKey::new(query.route_key);
    let width = query.width.unwrap_or(DEFAULT_WIDTH);

    let session = match state.manager.get_session_by_route_key(&route_key).await {
        Some(session) => session,
        None => match state.manager.app_entry(route_key.as_str()).await {
            Some(_) => {
                let (tx, _rx) = mpsc::channel(1);
                let connector = Connector::new(tx);
                let (cols, rows) = DISCONNECTED_GEOMETRY;
                match state
                    .manager
                    .new_session(
                        route_key.clone(),
                        SessionId::generate(),
                        route_key.as_str(),
                        cols,
                        rows,
                        connector,
                    )
                    .await
                {
                    Ok(session) => {
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                        session
                    }
                    Err(_) => return (StatusCode::NOT_FOUND, "no such session").into_response(),
                }
            }
            None => return (StatusCode::NOT_FOUND, "no such session").into_response(),
        },
    };

    let bytes = session.get_replay_buffer();
    let mut screen = Screen::new(width, DEFAULT_HEIGHT);
    screen.feed(&bytes);

    let svg = render_svg(&screen, width);
    ([(axum::http::header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

const DEFAULT_FG: &str = "#e0e0e0";

/// Render a screen snapshot as a monospace SVG grid: one `<rect>`/`<text>`
/// pair per same-pen run, so SGR colour/weight/decoration survive (§4.8).
fn render_svg(screen: &Screen, width: u16) -> String {
    let lines = screen.styled_lines();
    let px_width = width as u32 * CELL_WIDTH;
    let px_height = lines.len() as u32 * CELL_HEIGHT;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px_width}\" height=\"{px_height}\" font-family=\"monospace\" font-size=\"{FONT_SIZE}\">"
    ));
    svg.push_str(&format!("<rect width=\"{px_width}\" height=\"{px_height}\" fill=\"#000000\"/>"));

    for (row, spans) in lines.iter().enumerate() {
        let y_top = row as u32 * CELL_HEIGHT;
        let y_text = y_top + CELL_HEIGHT - 4;
        let mut col = 0u32;

        for span in spans {
            let span_cols = span.text.chars().count() as u32;
            let x = col * CELL_WIDTH;

            if let Some((r, g, b)) = span.bg {
                let w = span_cols * CELL_WIDTH;
                svg.push_str(&format!(
                    "<rect x=\"{x}\" y=\"{y_top}\" width=\"{w}\" height=\"{CELL_HEIGHT}\" fill=\"rgb({r},{g},{b})\"/>"
                ));
            }

            let fill = span.fg.map_or_else(|| DEFAULT_FG.to_owned(), |(r, g, b)| format!("rgb({r},{g},{b})"));

            let mut style = String::new();
            if span.bold {
                style.push_str("font-weight:bold;");
            }
            if span.italic {
                style.push_str("font-style:italic;");
            }
            let mut decorations = Vec::new();
            if span.underline {
                decorations.push("underline");
            }
            if span.strikethrough {
                decorations.push("line-through");
            }
            if !decorations.is_empty() {
                style.push_str(&format!("text-decoration:{};", decorations.join(" ")));
            }
            let style_attr = if style.is_empty() { String::new() } else { format!(" style=\"{style}\"") };

            svg.push_str(&format!(
                "<text x=\"{x}\" y=\"{y_text}\" fill=\"{fill}\"{style_attr} xml:space=\"preserve\">{}</text>",
                escape_xml(&span.text)
            ));
            col += span_cols;
        }
    }

    svg.push_str("</svg>");
    svg
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
#[path = "screenshot_tests.rs"]
mod tests;
