//! Default output file naming

use crate::{BarSize, Contract, DataType};
use std::path::PathBuf;

/// Default file name: `SYMBOL-EXCHANGE[_EXPIRY]_<barsize>_<DATATYPE>.csv`
///
/// Path separators and colons in the contract label are replaced so the
/// name always stays inside the working directory.
pub fn default_file_name(contract: &Contract, bar_size: BarSize, data_type: DataType) -> String {
    let label = contract.label().replace([':', '/', '\\'], "_");
    format!("{}_{}_{}.csv", label, bar_size.file_token(), data_type)
}

/// Explicit path if given, otherwise the default file name in the working directory
pub fn output_path(
    explicit: Option<PathBuf>,
    contract: &Contract,
    bar_size: BarSize,
    data_type: DataType,
) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(default_file_name(contract, bar_size, data_type)))
}
