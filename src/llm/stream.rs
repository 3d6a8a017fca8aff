use anyhow::Result;
use std::io::BufRead;

use super::{Completion, Usage};

/// What a single line of a streaming response carried.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    /// Usage only arrives in the final chunk, so it ends the stream.
    Usage(Usage),
    Done,
}

/// Read a streaming response line-by-line, forwarding text deltas to
/// `on_delta` as they arrive.
pub fn read_stream<R, F>(
    reader: R,
    mut parse_line: F,
    on_delta: &mut dyn FnMut(&str) -> Result<()>,
) -> Result<Completion>
where
    R: BufRead,
    F: FnMut(&str) -> Result<Option<StreamEvent>>,
{
    let mut out = Completion::default();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line)? {
            Some(StreamEvent::Delta(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                out.text.push_str(&chunk);
                on_delta(&chunk)?;
            }
            Some(StreamEvent::Usage(usage)) => {
                out.usage = Some(usage);
                break;
            }
            Some(StreamEvent::Done) => {
                log::trace!("stream done");
                break;
            }
            None => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(line: &str) -> Result<Option<StreamEvent>> {
        Ok(match line {
            "end" => Some(StreamEvent::Done),
            "usage" => Some(StreamEvent::Usage(Usage {
                prompt_tokens: 3,
                completion_tokens: 2,
                total_tokens: 5,
            })),
            "skip" => None,
            other => Some(StreamEvent::Delta(other.to_string())),
        })
    }

    #[test]
    fn collects_deltas_until_done() {
        let input = Cursor::new("Add\n\n skip\nparser\nend\nignored\n");
        let mut seen = Vec::new();
        let out = read_stream(input, parse, &mut |d| {
            seen.push(d.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(out.text, "Addparser");
        assert_eq!(seen, vec!["Add", "parser"]);
        assert!(out.usage.is_none());
    }

    #[test]
    fn usage_chunk_ends_stream() {
        let input = Cursor::new("Fix\nusage\nlate\n");
        let out = read_stream(input, parse, &mut |_| Ok(())).unwrap();

        assert_eq!(out.text, "Fix");
        assert_eq!(out.usage.map(|u| u.total_tokens), Some(5));
    }

    #[test]
    fn sink_errors_abort_the_stream() {
        let input = Cursor::new("one\ntwo\n");
        let err = read_stream(input, parse, &mut |_| anyhow::bail!("closed")).unwrap_err();
        assert_eq!(err.to_string(), "closed");
    }
}
