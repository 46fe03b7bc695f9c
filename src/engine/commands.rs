//! Shell command lines for the fast path. Every path is single-quoted.

pub(crate) fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn with_operands(program: &str, operands: &[&str]) -> String {
    let mut command = String::from(program);
    command.push_str(" --");
    for operand in operands {
        command.push(' ');
        command.push_str(&quote(operand));
    }
    command
}

/// A single source names its exact target (`-T`, GNU coreutils), so an
/// existing directory there is never nested into. Several sources land inside
/// `destination`.
fn transfer_command(program: &str, sources: &[String], destination: &str) -> String {
    let mut operands: Vec<&str> = sources.iter().map(String::as_str).collect();
    operands.push(destination);
    match sources {
        [_] => with_operands(&format!("{program} -T"), &operands),
        _ => with_operands(program, &operands),
    }
}

pub(crate) fn move_command(sources: &[String], destination: &str) -> String {
    transfer_command("mv -f", sources, destination)
}

pub(crate) fn copy_command(sources: &[String], destination: &str) -> String {
    transfer_command("cp -R", sources, destination)
}

pub(crate) fn remove_command(paths: &[String]) -> String {
    let operands: Vec<&str> = paths.iter().map(String::as_str).collect();
    with_operands("rm -rf", &operands)
}

pub(crate) fn extract_command(extractor: &str, dir: &str, archive_name: &str) -> String {
    format!("cd {} && {extractor} {}", quote(dir), quote(archive_name))
}
