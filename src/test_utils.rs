use std::path::Path;
use std::sync::Arc;

use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::table::{EquipmentRecord, EquipmentTable};

/// A well-formed CSV document with the four required columns and two rows.
pub(crate) fn sample_csv() -> &'static str {
    "Type,Flowrate,Pressure,Temperature\nPump,10,5,20\nValve,20,15,30\n"
}

/// The table produced by validating [sample_csv].
pub(crate) fn sample_table() -> EquipmentTable {
    EquipmentTable {
        records: vec![
            EquipmentRecord {
                equipment_type: "Pump".to_string(),
                flowrate: 10.0,
                pressure: 5.0,
                temperature: 20.0,
                name: None,
            },
            EquipmentRecord {
                equipment_type: "Valve".to_string(),
                flowrate: 20.0,
                pressure: 15.0,
                temperature: 30.0,
                name: None,
            },
        ],
        name_supported: false,
    }
}

/// A table with a name column, including one unnamed row.
pub(crate) fn named_table() -> EquipmentTable {
    EquipmentTable {
        records: vec![
            EquipmentRecord {
                equipment_type: "Pump".to_string(),
                flowrate: 10.0,
                pressure: 5.0,
                temperature: 20.0,
                name: Some("P-101".to_string()),
            },
            EquipmentRecord {
                equipment_type: "Valve".to_string(),
                flowrate: 20.0,
                pressure: 15.0,
                temperature: 30.0,
                name: Some("V-201".to_string()),
            },
            EquipmentRecord {
                equipment_type: "Pump".to_string(),
                flowrate: 30.0,
                pressure: 25.0,
                temperature: 40.0,
                name: None,
            },
            EquipmentRecord {
                equipment_type: "Compressor".to_string(),
                flowrate: 40.0,
                pressure: 35.0,
                temperature: 50.0,
                name: Some("C-301".to_string()),
            },
        ],
        name_supported: true,
    }
}

/// Command line arguments rooted at a temporary data directory.
pub(crate) fn test_args(data_dir: &Path) -> CommandLineArgs {
    CommandLineArgs {
        host: "0.0.0.0".to_string(),
        port: 8080,
        https: false,
        cert_file: "cert.pem".to_string(),
        key_file: "key.pem".to_string(),
        graceful_shutdown_timeout: 60,
        data_dir: data_dir.to_string_lossy().to_string(),
        max_datasets_per_user: 5,
        max_upload_size: "16 MiB".to_string(),
        memory_limit: None,
        task_limit: None,
        use_rayon: false,
        enable_jaeger: false,
        admin_username: None,
        admin_password: None,
        admin_email: None,
    }
}

/// Build shared application state over the given arguments.
pub(crate) async fn test_state(args: &CommandLineArgs) -> SharedAppState {
    Arc::new(AppState::new(args).await.unwrap())
}
