//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `notegraph_core` linkage and store bootstrap end to end.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `notegraph_cli [config.json]`

use log::info;
use notegraph_core::{
    EngineConfig, NewNote, NoteService, SqliteGraphRepository, SqliteKeywordLedger,
    SqliteNoteRepository,
};
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    println!("notegraph_core ping={}", notegraph_core::ping());
    println!("notegraph_core version={}", notegraph_core::core_version());

    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("notegraph_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => EngineConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if notegraph_core::init_logging_from_config(&config)? {
        info!("event=cli_start module=cli status=ok");
    }

    let (relational, graph) = config.open_stores()?;
    let service = NoteService::new(
        SqliteNoteRepository::try_new(&relational)?,
        SqliteKeywordLedger::try_new(&relational)?,
        SqliteGraphRepository::try_new(&graph)?,
    )
    .with_graph_depth(config.graph_depth);

    let owner_id = Uuid::new_v4();
    service.create(NewNote {
        owner_id,
        title: Some("Alpha".to_string()),
        represents_keyword: true,
        ..NewNote::default()
    })?;
    service.create(NewNote {
        owner_id,
        title: Some("Beta".to_string()),
        text: Some("links [[Alpha]] and [[Orphan]]".to_string()),
        ..NewNote::default()
    })?;

    let projection = service.get_graph(owner_id, None, None)?;
    println!(
        "graph nodes={} connections={}",
        projection.nodes.len(),
        projection.connections.len()
    );
    Ok(())
}
