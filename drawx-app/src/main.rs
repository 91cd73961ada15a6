//! DrawX headless demo.
//!
//! Opens the configured store, attaches a software-rendered surface, draws a
//! few strokes through the same input path a touch screen would use, and
//! reports what ended up on screen.
//!
//! ```text
//! drawx [config.json] [--clear]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use log::info;

use drawx_app::{AppConfig, AppError, DrawSession, PointerEvent};
use drawx_core::{Rgba, SwatchColor};
use drawx_render::RasterSink;

const SURFACE: (u32, u32) = (683, 683);

struct Args {
    config: Option<PathBuf>,
    clear: bool,
}

fn parse_args() -> Result<Args, AppError> {
    let mut args = Args {
        config: None,
        clear: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--clear" => args.clear = true,
            flag if flag.starts_with("--") => {
                return Err(AppError::Usage(format!("unknown flag {flag}")));
            }
            path if args.config.is_none() => args.config = Some(PathBuf::from(path)),
            extra => return Err(AppError::Usage(format!("unexpected argument {extra}"))),
        }
    }
    Ok(args)
}

/// A stroke as a list of surface positions.
fn gesture(session: &mut DrawSession, pointer: u64, points: &[(f64, f64)]) -> Result<(), AppError> {
    let Some((last, rest)) = points.split_last() else {
        return Ok(());
    };
    for (i, &(x, y)) in rest.iter().enumerate() {
        let event = if i == 0 {
            PointerEvent::down(pointer, x, y)
        } else {
            PointerEvent::moved(pointer, x, y)
        };
        session.handle_pointer(&event)?;
    }
    session.handle_pointer(&PointerEvent::up(pointer, last.0, last.1))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    info!("Starting DrawX...");

    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    config.apply_env()?;

    let mut session = DrawSession::new(config);
    let sink = RasterSink::new(SURFACE.0, SURFACE.1);
    let front = sink.front();
    session.surface_created(SURFACE.0, SURFACE.1, sink)?;

    let store = session.connect().await?;
    info!(
        "Store open ({}): {} strokes at version {}",
        store.backend_name(),
        store.query_all().len(),
        store.version()
    );

    if args.clear {
        session.clear_canvas()?;
    }

    let original = session.selected();
    session.select_color(SwatchColor::Peach);
    gesture(&mut session, 1, &[(100.0, 100.0), (200.0, 160.0), (300.0, 120.0)])?;
    session.select_color(SwatchColor::Ultramarine);
    gesture(&mut session, 1, &[(120.0, 500.0), (340.0, 420.0), (560.0, 520.0)])?;
    session.select_color(original);

    // Wait for the loop to catch up with the last commit.
    let target = store.version();
    if let Some(mut frames) = session.frames() {
        let caught_up = frames.wait_for(|f| f.version >= target);
        match tokio::time::timeout(Duration::from_secs(2), caught_up).await {
            Ok(Ok(frame)) => info!(
                "Frame {} at version {}: {} strokes, {} segments",
                frame.frame, frame.version, frame.strokes, frame.segments
            ),
            _ => log::warn!("Render loop did not reach version {target}"),
        }
    }

    if let Some(frame) = front.snapshot() {
        let background = Rgba::WHITE.to_argb();
        let inked = frame.pixels().iter().filter(|&&p| p != background).count();
        info!("{inked} inked pixels on screen");
    }

    if let Some(stats) = session.shutdown()? {
        info!(
            "Done: {} frames presented, {} strokes drawn",
            stats.frames_presented, stats.strokes_drawn
        );
    }
    Ok(())
}
