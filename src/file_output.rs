use crate::compiler::compiler_errors::CompileError;
use crate::compiler::lir::display_lir;
use crate::compiler::lir::nodes::LirModule;
use std::fs;
use std::path::Path;

/// Write the lowered module as JSON (the machine contract the target
/// emitters consume) next to a human-readable text rendering.
pub fn write_lir_files(module: &LirModule, output_path: &Path) -> Result<(), CompileError> {
    if let Some(parent_dir) = output_path.parent() {
        if !parent_dir.as_os_str().is_empty() && fs::metadata(parent_dir).is_err() {
            fs::create_dir_all(parent_dir).map_err(|e| {
                CompileError::file_error(output_path, format!("error creating directory: {e}"))
            })?;
        }
    }

    let json = serde_json::to_string_pretty(module).map_err(|e| {
        CompileError::file_error(output_path, format!("error serializing module: {e}"))
    })?;
    fs::write(output_path.with_extension("lir.json"), json).map_err(|e| {
        CompileError::file_error(output_path, format!("error writing module: {e}"))
    })?;

    fs::write(output_path.with_extension("lir.txt"), display_lir(module)).map_err(|e| {
        CompileError::file_error(output_path, format!("error writing text rendering: {e}"))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lir::lower_parse_tree;

    #[test]
    fn writes_json_and_text_next_to_each_other() {
        let (module, messages) = lower_parse_tree(&[]);
        assert!(!messages.has_errors());

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("programma");
        write_lir_files(&module, &output).unwrap();

        let json = fs::read_to_string(output.with_extension("lir.json")).unwrap();
        let round_trip: LirModule = serde_json::from_str(&json).unwrap();
        assert_eq!(round_trip.functions.len(), module.functions.len());

        let text = fs::read_to_string(output.with_extension("lir.txt")).unwrap();
        assert!(text.contains("main"));
    }
}
