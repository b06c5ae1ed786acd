pub mod cobranca;
pub mod colaborador;
pub mod empresa;
pub mod import_issue;
pub mod lote;
pub mod nota_fiscal;
pub mod session;

pub use cobranca::*;
pub use colaborador::*;
pub use empresa::*;
pub use import_issue::ImportIssue;
pub use lote::{Lote, LoteStatus};
pub use nota_fiscal::NotaFiscal;
pub use session::{SessionContext, UserRole};
