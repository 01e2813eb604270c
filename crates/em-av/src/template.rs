//! Encoding task command templates.
//!
//! A task's command is a string of ffmpeg arguments such as
//! `-vcodec libx264 -s 640x360`. It is split shell-style (quotes and
//! backslash escapes are honoured) and wrapped with the input and output
//! paths. Templates that mention `{input}` or `{output}` place those paths
//! themselves.

use std::path::Path;

use em_core::{Error, Result};

const INPUT: &str = "{input}";
const OUTPUT: &str = "{output}";

/// Arguments placed before everything else: overwrite the output, and send
/// machine-readable progress to stderr instead of the stats line.
const PROGRESS_ARGS: [&str; 4] = ["-nostats", "-progress", "pipe:2", "-y"];

/// Split a command string into arguments.
pub fn split_args(command: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => match chars.next() {
                Some(next) => current.push(next),
                None => break,
            },
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                    in_token = true;
                }
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(Error::Validation(format!(
            "unterminated {q} quote in command: {command}"
        )));
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}

/// Build the full ffmpeg argument list for one step.
///
/// Without placeholders the result is
/// `-nostats -progress pipe:2 -y -i <input> <command...> <output>`.
pub fn build_args(command: &str, input: &Path, output: &Path) -> Result<Vec<String>> {
    let input = input.to_string_lossy();
    let output = output.to_string_lossy();
    let tokens = split_args(command)?;

    let has_input = tokens.iter().any(|t| t.contains(INPUT));
    let has_output = tokens.iter().any(|t| t.contains(OUTPUT));

    let mut args: Vec<String> = PROGRESS_ARGS.iter().map(|s| s.to_string()).collect();
    if !has_input {
        args.push("-i".into());
        args.push(input.to_string());
    }
    args.extend(
        tokens
            .into_iter()
            .map(|t| t.replace(INPUT, &input).replace(OUTPUT, &output)),
    );
    if !has_output {
        args.push(output.to_string());
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_words() {
        assert_eq!(
            split_args("  -vcodec libx264   -s 640x360 ").unwrap(),
            vec!["-vcodec", "libx264", "-s", "640x360"]
        );
    }

    #[test]
    fn split_respects_quotes_and_escapes() {
        assert_eq!(
            split_args(r#"-vf "scale=640:-2, fps=30" -metadata title='My Video' a\ b"#).unwrap(),
            vec!["-vf", "scale=640:-2, fps=30", "-metadata", "title=My Video", "a b"]
        );
    }

    #[test]
    fn split_keeps_empty_quoted_argument() {
        assert_eq!(split_args(r#"-metadata comment="""#).unwrap(), vec!["-metadata", "comment="]);
        assert_eq!(split_args("''").unwrap(), vec![""]);
    }

    #[test]
    fn split_rejects_unterminated_quote() {
        assert!(matches!(split_args("-vf 'scale"), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_command_is_plain_copy() {
        let args = build_args("", Path::new("/v/in.mp4"), Path::new("/v/in-360p.mp4")).unwrap();
        assert_eq!(
            args,
            vec!["-nostats", "-progress", "pipe:2", "-y", "-i", "/v/in.mp4", "/v/in-360p.mp4"]
        );
    }

    #[test]
    fn command_goes_between_input_and_output() {
        let args = build_args(
            "-s 640x360",
            Path::new("/v/in.mp4"),
            Path::new("/v/in-360p.mp4"),
        )
        .unwrap();
        assert_eq!(&args[4..], ["-i", "/v/in.mp4", "-s", "640x360", "/v/in-360p.mp4"]);
    }

    #[test]
    fn placeholders_control_placement() {
        let args = build_args(
            "-ss 5 -i {input} -t 10 -f mp4 {output}",
            Path::new("/v/in.mp4"),
            Path::new("/v/clip.mp4"),
        )
        .unwrap();
        assert_eq!(
            &args[4..],
            ["-ss", "5", "-i", "/v/in.mp4", "-t", "10", "-f", "mp4", "/v/clip.mp4"]
        );
    }

    #[test]
    fn output_placeholder_alone() {
        let args = build_args("-f mp4 {output}", Path::new("/v/in.mp4"), Path::new("/v/o.mp4"))
            .unwrap();
        assert_eq!(&args[4..], ["-i", "/v/in.mp4", "-f", "mp4", "/v/o.mp4"]);
    }
}
