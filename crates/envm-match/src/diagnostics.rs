use std::io::Write;

use envm_core::errors::{EnvmError, ErrorInfo};
use envm_lap::Assignment;
use serde::{Deserialize, Serialize};

use crate::environment::Species;
use crate::matrix::KernelMatrix;

fn default_width() -> usize {
    8
}

fn default_precision() -> usize {
    4
}

/// Number formatting for the diagnostic dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFormat {
    /// Minimum field width of each matrix entry.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Mantissa digits after the decimal point.
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for DumpFormat {
    fn default() -> Self {
        Self {
            width: default_width(),
            precision: default_precision(),
        }
    }
}

impl DumpFormat {
    /// Formats `value` in C-style scientific notation (`1.2345e-03`).
    pub fn format(&self, value: f64) -> String {
        let raw = format!("{:.*e}", self.precision, value);
        let text = match raw.split_once('e') {
            Some((mantissa, exponent)) => match exponent.parse::<i32>() {
                Ok(exp) => {
                    let sign = if exp < 0 { '-' } else { '+' };
                    format!("{mantissa}e{sign}{:02}", exp.abs())
                }
                Err(_) => raw.clone(),
            },
            // inf and NaN carry no exponent
            None => raw.clone(),
        };
        format!("{text:>width$}", width = self.width)
    }
}

fn sink_error(err: std::io::Error) -> EnvmError {
    EnvmError::Serde(ErrorInfo::new("diagnostic-write", err.to_string()))
}

/// Writes the species listing of both sides, the kernel matrix and, when
/// given, the matched pairs.
pub fn write_dump(
    out: &mut dyn Write,
    matrix: &KernelMatrix,
    assignment: Option<&Assignment>,
    format: &DumpFormat,
) -> Result<(), EnvmError> {
    write_species(out, matrix.row_species(), matrix.col_species()).map_err(sink_error)?;
    write_matrix(out, matrix, format).map_err(sink_error)?;
    if let Some(assignment) = assignment {
        write_pairs(out, assignment).map_err(sink_error)?;
    }
    out.flush().map_err(sink_error)
}

/// Writes only the species listing, for comparisons that build no kernel
/// matrix.
pub fn write_species_listing(
    out: &mut dyn Write,
    rows: &[Species],
    cols: &[Species],
) -> Result<(), EnvmError> {
    write_species(out, rows, cols).map_err(sink_error)?;
    out.flush().map_err(sink_error)
}

fn write_species(out: &mut dyn Write, rows: &[Species], cols: &[Species]) -> std::io::Result<()> {
    writeln!(
        out,
        "# atomic species in the molecules (possibly topped up with dummy isolated atoms): "
    )?;
    for labels in [rows, cols] {
        for species in labels {
            write!(out, " {species} ")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_matrix(
    out: &mut dyn Write,
    matrix: &KernelMatrix,
    format: &DumpFormat,
) -> std::io::Result<()> {
    writeln!(out, "# environment kernel matrix: ")?;
    let values = matrix.values();
    for row in values.row_iter() {
        for value in row.iter() {
            write!(out, "{} ", format.format(*value))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_pairs(out: &mut dyn Write, assignment: &Assignment) -> std::io::Result<()> {
    writeln!(out, "# optimal environment list: ")?;
    for (row, col) in &assignment.pairs {
        writeln!(out, "{row}  {col}  ")?;
    }
    Ok(())
}
