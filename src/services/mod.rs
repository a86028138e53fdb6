pub mod monitor;
pub mod notifier;
pub mod sessions;
pub mod signal_log;
pub mod signals;
pub mod sqlite_store;
pub mod users;

pub use monitor::{CycleReport, MonitorSettings, TrendMonitor};
pub use notifier::{render_verdict, LogNotifier, Notifier, TelegramNotifier};
pub use sessions::{PendingAction, Selection, SelectionSessions};
pub use signal_log::{MemorySignalLog, SignalHistoryStore};
pub use signals::{IndicatorEngine, SidewayAnchorLocator, TrendClassifier};
pub use sqlite_store::SqliteStore;
pub use users::{MemoryUserDirectory, UserDirectory};
