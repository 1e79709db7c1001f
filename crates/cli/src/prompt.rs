use std::io::{BufRead, Write};

use anyhow::bail;
use subgather_core::verify::parse_proxy_list;
use subgather_core::Target;

/// Print `question` and read one trimmed line. `None` when input is closed.
fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> anyhow::Result<Option<String>> {
    write!(output, "{question}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

pub fn ask_target<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> anyhow::Result<Target> {
    loop {
        let Some(answer) = read_answer(input, output, "target mode (nekobox/singbox): ")? else {
            bail!("input closed before a target mode was chosen");
        };
        match answer.parse::<Target>() {
            Ok(target) => return Ok(target),
            Err(err) => writeln!(output, "{err}")?,
        }
    }
}

pub fn ask_workers<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    default: usize,
) -> anyhow::Result<usize> {
    let question = format!("worker count [{default}]: ");
    loop {
        let Some(answer) = read_answer(input, output, &question)? else {
            bail!("input closed before a worker count was chosen");
        };
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<usize>() {
            Ok(workers) if workers > 0 => return Ok(workers),
            _ => writeln!(output, "worker count must be a positive integer")?,
        }
    }
}

/// Empty answer or closed input means no proxies.
pub fn ask_proxies<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<Vec<String>> {
    let answer = read_answer(input, output, "proxies (comma separated, empty for none): ")?;
    Ok(answer.map(|raw| parse_proxy_list(&raw)).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn target_reprompts_until_valid() {
        let mut input = Cursor::new("clash\n\n Singbox \n");
        let mut output = Vec::new();

        let target = ask_target(&mut input, &mut output).unwrap();
        assert_eq!(target, Target::Singbox);

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("target mode").count(), 3);
    }

    #[test]
    fn target_fails_on_closed_input() {
        let mut input = Cursor::new("foo\n");
        assert!(ask_target(&mut input, &mut Vec::new()).is_err());
    }

    #[test]
    fn workers_default_and_validation() {
        let mut output = Vec::new();
        assert_eq!(ask_workers(&mut Cursor::new("\n"), &mut output, 8).unwrap(), 8);
        assert_eq!(
            ask_workers(&mut Cursor::new("0\n-2\nabc\n12\n"), &mut output, 8).unwrap(),
            12
        );
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("positive integer").count(), 3);
    }

    #[test]
    fn proxies_are_split_on_commas() {
        let mut output = Vec::new();
        let proxies = ask_proxies(
            &mut Cursor::new("http://127.0.0.1:7890, socks5://127.0.0.1:1080\n"),
            &mut output,
        )
        .unwrap();
        assert_eq!(
            proxies,
            vec!["http://127.0.0.1:7890", "socks5://127.0.0.1:1080"]
        );
        assert!(ask_proxies(&mut Cursor::new(""), &mut output).unwrap().is_empty());
    }
}
