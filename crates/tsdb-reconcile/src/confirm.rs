use std::io::{self, BufRead, Write};

/// Blocking yes/no question put to an operator.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<C: Confirm + ?Sized> Confirm for &mut C {
    fn confirm(&mut self, prompt: &str) -> bool {
        (**self).confirm(prompt)
    }
}

/// Only a case-insensitive "y" is a yes. Empty input declines.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// Prompts on a writer and reads one line per question.
pub struct TerminalConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalConfirm<io::StdinLock<'static>, io::Stderr> {
    /// Prompts go to stderr so stdout stays machine readable.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Confirm for TerminalConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        if write!(self.output, "{prompt}")
            .and_then(|_| self.output.flush())
            .is_err()
        {
            tracing::warn!("could not write confirmation prompt; treating as declined");
            return false;
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) => is_affirmative(&line),
            Err(e) => {
                tracing::warn!(error = %e, "could not read confirmation; treating as declined");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_y_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative("Y\n"));
        assert!(is_affirmative("  y  "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("yes"));
        assert!(!is_affirmative("n"));
    }

    #[test]
    fn terminal_reads_one_line_per_prompt() {
        let input: &[u8] = b"y\nno\n";
        let mut out = Vec::new();
        let mut c = TerminalConfirm::new(input, &mut out);
        assert!(c.confirm("first? "));
        assert!(!c.confirm("second? "));
        // EOF declines.
        assert!(!c.confirm("third? "));
        drop(c);
        assert_eq!(String::from_utf8(out).unwrap(), "first? second? third? ");
    }
}
