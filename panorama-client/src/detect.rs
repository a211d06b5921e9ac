//! Environment detection: color capability and window identity

use panorama_mux::TmuxCli;
use panorama_protocol::ColorProfile;

/// Color capability from `NO_COLOR`, `COLORTERM` and `TERM`
pub fn color_profile(no_color: bool, colorterm: Option<&str>, term: Option<&str>) -> ColorProfile {
    if no_color {
        return ColorProfile::None;
    }
    if matches!(colorterm, Some("truecolor") | Some("24bit")) {
        return ColorProfile::Truecolor;
    }
    match term {
        None | Some("dumb") => ColorProfile::None,
        Some(t) if t.contains("256color") => ColorProfile::Ansi256,
        Some(_) => ColorProfile::Ansi16,
    }
}

pub fn color_profile_from_env() -> ColorProfile {
    color_profile(
        std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()),
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

/// The window to render for: explicit, else the one holding `$TMUX_PANE`
pub async fn window_id(explicit: Option<String>) -> Option<String> {
    if explicit.is_some() {
        return explicit;
    }
    let pane = std::env::var("TMUX_PANE").ok()?;
    match TmuxCli::window_containing(&pane).await {
        Ok(window) => Some(window),
        Err(e) => {
            tracing::warn!(%pane, error = %e, "could not resolve window of $TMUX_PANE");
            None
        }
    }
}
