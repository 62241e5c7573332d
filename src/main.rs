use std::env;
use std::fs;
use std::process;

use floc::compile;

enum Mode {
  Arm,
  Table,
}

fn usage(program: &str) -> ! {
  // Usage goes to stdout; only compilation defects go to stderr.
  println!("usage: {program} -arm|-table SOURCE.flo");
  process::exit(1);
}

fn main() {
  let args: Vec<String> = env::args().collect();
  let program = args.first().map(String::as_str).unwrap_or("floc");

  let mode = match args.get(1).map(String::as_str) {
    Some("-arm") => Mode::Arm,
    Some("-table") => Mode::Table,
    _ => usage(program),
  };
  let Some(path) = args.get(2) else {
    usage(program);
  };

  let source = match fs::read_to_string(path) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("cannot read {path}: {err}");
      process::exit(1);
    }
  };

  match compile(&source) {
    Ok(result) => match mode {
      Mode::Arm => print!("{}", result.assembly),
      Mode::Table => print!("{}", result.symbols),
    },
    Err(err) => {
      eprintln!("Error: {err}");
      process::exit(1);
    }
  }
}
