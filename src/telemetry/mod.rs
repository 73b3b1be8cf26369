pub mod exporter;
pub mod transport;

pub use exporter::{spawn_exporter, ExportStats, Exporter, ExporterHandle, ExporterSettings, DEBOUNCE};
pub use transport::{HttpTransport, Transport};
