use crate::core::config::AppConfig;
use crate::core::engine::EngineClient;
use crate::core::history::HistoryReader;
use crate::core::terminal::{print_error, print_info, print_step, print_success, print_warn};

/// Checks the engine and the history database. Returns `true` when both
/// are usable.
pub async fn run_doctor(config: &AppConfig) -> bool {
    print_step("Checking engine and history access...");
    println!();

    let mut healthy = true;

    // 1. Engine
    let engine = EngineClient::new(config.engine.clone());
    if !engine.is_configured() {
        print_error("BPM_BASE_URL is not set.");
        healthy = false;
    } else {
        match engine.ping().await {
            Ok(()) => print_success(&format!("Engine reachable at {}", config.engine.base())),
            Err(e) => {
                print_error(&format!("Engine at {} failed: {}", config.engine.base(), e));
                healthy = false;
            }
        }
    }
    if config.engine.username.is_empty() {
        print_warn("BPM_USER is empty; engine calls will be anonymous.");
    }

    // 2. History database
    let history = HistoryReader::new(&config.history.db_path);
    match history.ping().await {
        Ok(count) => print_success(&format!(
            "History database readable ({} task rows)",
            count
        )),
        Err(e) => {
            print_error(&format!("History database: {:#}", e));
            healthy = false;
        }
    }

    // 3. Bulk upload form
    match &config.bulk.form_definition_id {
        Some(id) => print_info(&format!("Bulk upload validates against form {}", id)),
        None => print_warn("BULK_FORM_DEFINITION_ID is not set; bulk validation will fail."),
    }

    println!();
    if healthy {
        print_success("All checks passed.");
    }
    healthy
}
