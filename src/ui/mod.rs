pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, muted, resolution, section, status, success, summary_row, warn};
pub use progress::{BatchProgress, Spinner};
pub use table::{results_table, stats_table, BatchRow, TableBuilder};
pub use theme::{theme, Theme};
