//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `spanote_core` linkage and print its version.
//! - Walk one in-memory annotation flow and print the rendered segments.
//!
//! # Invariants
//! - Output is deterministic apart from generated ids.
//! - File logging starts only when `SPANOTE_LOG_DIR` names an absolute path.

use log::info;
use spanote_core::db::open_db_in_memory;
use spanote_core::{
    default_log_level, init_logging, AnnotationService, ContentKind, MemoryContentSource, Scope,
    ScopeSession, Segment, SelectionOutcome, SqliteAnnotationRepository,
};
use std::error::Error;

const DEMO_TEXT: &str = "The quick brown fox jumps.";
const PREVIEW_CHARS: usize = 24;

fn main() -> Result<(), Box<dyn Error>> {
    println!("spanote_core ping={}", spanote_core::ping());
    println!("spanote_core version={}", spanote_core::core_version());

    if let Ok(log_dir) = std::env::var("SPANOTE_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let scope = Scope::new("demo-run", "output");
    let mut source = MemoryContentSource::new();
    source.insert(scope.clone(), DEMO_TEXT, ContentKind::PlainText);

    let mut conn = open_db_in_memory()?;
    let mut service = AnnotationService::new(SqliteAnnotationRepository::try_new(&mut conn)?);
    let mut session = ScopeSession::open(&service, &source, scope)?;

    for (start, end, note) in [(4, 9, "speed"), (16, 19, "animal"), (7, 17, "rejected")] {
        session.begin_selection();
        match session.finish_selection_at(start, end) {
            SelectionOutcome::Candidate(_) => {
                let created = session.confirm(&mut service, note, Some("cli"))?;
                println!("created [{start},{end}) {}", created.preview(PREVIEW_CHARS));
            }
            SelectionOutcome::Rejected(reason) => {
                println!("rejected [{start},{end}) {reason:?}");
            }
        }
    }

    for segment in session.segments() {
        match segment {
            Segment::Plain { start, end, text } => println!("[{start:>2},{end:>2}) plain  {text:?}"),
            Segment::Annotated {
                start,
                end,
                text,
                annotation,
            } => println!(
                "[{start:>2},{end:>2}) marked {text:?} note={:?}",
                annotation.note
            ),
        }
    }

    info!(
        "event=cli_demo module=cli status=ok annotation_count={}",
        session.annotations().len()
    );
    Ok(())
}
