pub mod archive;
pub mod cli;
pub mod error;
pub mod filter;
pub mod model;
pub mod table;
pub mod ui;
pub mod writer;

pub use cli::{Cli, Commands};
pub use error::{ModelWarning, Result, SolutionError, StepError, TableError};
pub use model::{AssemblyOptions, BuildReport, DerivedTable, SolutionModel};
pub use table::{Cell, Row, Table, TableIndex};
pub use ui::{ConsoleUi, Phase, SilentUi, Ui, UiApp};
