use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

use pairadox_core::catalog::parse_upload;
use pairadox_core::domain::product::ProductCode;
use pairadox_core::{SubstitutionEngine, SubstitutionError};

use crate::commands::CommandResult;

const COMMAND: &str = "predict";

#[derive(Debug, Clone)]
pub struct PredictArgs {
    pub catalog: PathBuf,
    pub product: String,
    /// Observed substitutions in `SOURCE=SUBSTITUTE` form, replayed in order.
    pub feedback: Vec<String>,
}

pub fn run(args: &PredictArgs) -> CommandResult {
    let observations = match parse_feedback(&args.feedback) {
        Ok(observations) => observations,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_argument", message, 2),
    };

    let contents = match fs::read(&args.catalog) {
        Ok(contents) => contents,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "catalog_read",
                format!("failed to read `{}`: {error}", args.catalog.display()),
                3,
            );
        }
    };

    let engine = SubstitutionEngine::new();
    let file_name = args.catalog.file_name().and_then(OsStr::to_str);
    let loaded =
        parse_upload(file_name, &contents).and_then(|rows| engine.load_catalog(&rows));
    if let Err(error) = loaded {
        return CommandResult::failure(COMMAND, "catalog_format", error.to_string(), 4);
    }

    for (source, substitute) in &observations {
        engine.record_outcome(source, std::slice::from_ref(substitute));
    }

    match engine.predict(&ProductCode::from(args.product.trim())) {
        Ok(prediction) => CommandResult::document(COMMAND, &prediction),
        Err(error @ (SubstitutionError::NotFound(_) | SubstitutionError::EmptyCatalog)) => {
            CommandResult::failure(COMMAND, "not_found", error.to_string(), 5)
        }
        Err(error) => CommandResult::failure(COMMAND, "catalog_format", error.to_string(), 4),
    }
}

fn parse_feedback(entries: &[String]) -> Result<Vec<(ProductCode, ProductCode)>, String> {
    entries
        .iter()
        .map(|entry| {
            let (source, substitute) = entry
                .split_once('=')
                .map(|(source, substitute)| (source.trim(), substitute.trim()))
                .filter(|(source, substitute)| !source.is_empty() && !substitute.is_empty())
                .ok_or_else(|| {
                    format!("invalid feedback `{entry}`: expected SOURCE=SUBSTITUTE")
                })?;
            Ok((ProductCode::from(source), ProductCode::from(substitute)))
        })
        .collect()
}
