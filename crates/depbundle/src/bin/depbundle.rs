use std::process::ExitCode;

use depbundle::main as depbundle_main;

fn main() -> ExitCode {
    depbundle_main(std::env::args_os())
}
