//! Command-line entry point for the annotation store.
//!
//! # Responsibility
//! - Verify `annostore_core` linkage (`ping`).
//! - Offer import and lookup commands over a SQLite store file.
//! - Print results as one JSON document per line.
//! - `<db>` may be omitted when `ANNOSTORE_DB_PATH` is set.

use annostore_core::{
    init_logging_from_config, open_db, AnnotationStore, SqliteDocumentStore, StoreConfig,
};
use log::info;
use serde_json::{json, Value};
use std::error::Error;
use std::process::ExitCode;

const USAGE: &str = "usage:
  annostore ping
  annostore import [<db>] <file>
  annostore get [<db>] <id>
  annostore by-target [<db>] <iri>

<db> defaults to ANNOSTORE_DB_PATH";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::from_env()?;
    init_logging_from_config(&config)?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["ping"] => {
            println!("annostore_core ping={}", annostore_core::ping());
            println!("annostore_core version={}", annostore_core::core_version());
            Ok(())
        }
        ["import", db @ .., file] if db.len() <= 1 => {
            info!("event=cli_command module=cli status=start command=import");
            with_store(db.first().copied(), config, |store| {
                let summary = store.import_file(file)?;
                print_line(&json!({
                    "annotations_created": summary.annotations_created,
                    "collections_created": summary.collections_created,
                    "members_added": summary.members_added,
                    "failures": summary
                        .failures
                        .iter()
                        .map(|failure| json!({
                            "kind": failure.kind.as_str(),
                            "index": failure.index,
                            "status": failure.status_code,
                            "message": failure.message,
                        }))
                        .collect::<Vec<_>>(),
                }));
                Ok(())
            })
        }
        ["get", db @ .., id] if db.len() <= 1 => {
            with_store(db.first().copied(), config, |store| {
                print_line(&store.get_annotation(id, false)?);
                Ok(())
            })
        }
        ["by-target", db @ .., iri] if db.len() <= 1 => {
            with_store(db.first().copied(), config, |store| {
                for annotation in store.annotations_by_target(iri)? {
                    print_line(&annotation);
                }
                Ok(())
            })
        }
        _ => Err(USAGE.into()),
    }
}

fn with_store(
    db: Option<&str>,
    config: StoreConfig,
    action: impl FnOnce(&AnnotationStore<SqliteDocumentStore<'_>>) -> Result<(), Box<dyn Error>>,
) -> Result<(), Box<dyn Error>> {
    let conn = open_db(config.database_path(db)?)?;
    let store = AnnotationStore::with_config(SqliteDocumentStore::try_new(&conn)?, config);
    action(&store)
}

fn print_line(value: &Value) {
    println!("{value}");
}
