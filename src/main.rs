use ago::Compiler;
use ago::compiler::compiler_errors::{CompileError, print_errors, print_formatted_error};
use ago::compiler::lir::display_lir;
use ago::file_output::write_lir_files;
use ago::settings::{CONFIG_FILE_NAME, Config, PARSE_TREE_EXTENSION};
use ago::timer_log;
use colour::{e_red_ln, green_ln_bold, grey_ln, red_ln};
use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{env, fs};

enum Command {
    /// Compile a parse tree and write the lowered module next to it
    Build(PathBuf),
    /// Compile for diagnostics only, write nothing
    Check(PathBuf),
}

#[derive(PartialEq, Debug)]
enum Flag {
    ShowLir,
    DisableWarnings,
}

fn main() {
    let compiler_args: Vec<String> = env::args().collect();

    if compiler_args.len() < 2 {
        print_help(false);
        return;
    }

    let command = match get_command(&compiler_args[1..]) {
        Ok(command) => command,
        Err(e) => {
            red_ln!("{}", e);
            print_help(true);
            return;
        }
    };

    let flags = get_flags(&compiler_args);

    match command {
        Command::Build(path) => {
            let start = Instant::now();
            match compile_file(&path, &flags, true) {
                Ok(_) => {
                    grey_ln!("------------------------------------");
                    print!("Compiled in: ");
                    green_ln_bold!("{:?}", start.elapsed());
                }
                Err(code) => std::process::exit(code),
            }
        }

        Command::Check(path) => match compile_file(&path, &flags, false) {
            Ok(_) => green_ln_bold!("No errors found"),
            Err(code) => std::process::exit(code),
        },
    }
}

/// Returns the process exit code on failure.
fn compile_file(path: &Path, flags: &[Flag], write_output: bool) -> Result<(), i32> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            print_formatted_error(
                &CompileError::file_error(path, format!("cannot read parse tree: {e}")),
                path,
            );
            return Err(1);
        }
    };

    let config = load_config(path);
    let compiler = Compiler::new(&config);

    let start = Instant::now();
    let program = match compiler.json_to_parse_tree(&source) {
        Ok(program) => program,
        Err(e) => {
            print_formatted_error(&e, path);
            return Err(1);
        }
    };
    timer_log!(start, "Parse tree read in: ");

    let start = Instant::now();
    let (module, mut messages) = compiler.parse_tree_to_lir(&program);
    timer_log!(start, "Lowered in: ");

    if flags.contains(&Flag::DisableWarnings) {
        messages.warnings.clear();
    }
    let failed = messages.has_errors();
    print_errors(&messages, path);
    if failed {
        return Err(1);
    }

    if flags.contains(&Flag::ShowLir) {
        println!("{}", display_lir(&module));
    }

    if write_output {
        let output_path = match &config.output_dir {
            Some(dir) => dir.join(path.file_stem().unwrap_or(path.as_os_str())),
            None => path.to_owned(),
        };
        if let Err(e) = write_lir_files(&module, &output_path) {
            print_formatted_error(&e, path);
            return Err(1);
        }
    }

    Ok(())
}

/// An `ago.toml` next to the parse tree configures the project; a
/// missing or unreadable one just means defaults.
fn load_config(source_path: &Path) -> Config {
    let config_path = match source_path.parent() {
        Some(dir) => dir.join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    };
    match fs::read_to_string(&config_path) {
        Ok(content) => match Config::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                e_red_ln!("Invalid {}: {}", CONFIG_FILE_NAME, e);
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("build") => match args.get(1) {
            Some(path) => Ok(Command::Build(check_parse_tree_path(path)?)),
            None => Err("'build' needs a parse tree file path".to_string()),
        },
        Some("check") => match args.get(1) {
            Some(path) => Ok(Command::Check(check_parse_tree_path(path)?)),
            None => Err("'check' needs a parse tree file path".to_string()),
        },
        Some(other) => Err(format!("Invalid command: '{other}' is not a command")),
        None => Err("No command given".to_string()),
    }
}

fn check_parse_tree_path(path: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(format!("Path does not exist: {}", path.display()));
    }
    if path.extension().and_then(|e| e.to_str()) != Some(PARSE_TREE_EXTENSION) {
        return Err(format!(
            "Expected a .{PARSE_TREE_EXTENSION} parse tree file: {}",
            path.display()
        ));
    }
    Ok(path)
}

fn get_flags(args: &[String]) -> Vec<Flag> {
    let mut flags = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--lir" => flags.push(Flag::ShowLir),
            "--hide-warnings" => flags.push(Flag::DisableWarnings),

            _ => {}
        }
    }

    flags
}

fn print_help(commands_only: bool) {
    if !commands_only {
        grey_ln!("------------------------------------");
        green_ln_bold!("The Ago compiler core");
        println!("Usage: agoc <command> <args>");
    }
    green_ln_bold!("Commands:");
    println!("  build <path>   - Lowers a parse tree (.json) and writes the LIR next to it");
    println!("  check <path>   - Lowers a parse tree for diagnostics only");
    println!("Flags:");
    println!("  --lir            - Prints the lowered module to stdout");
    println!("  --hide-warnings  - Suppresses warnings");
}
