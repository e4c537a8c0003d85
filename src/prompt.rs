use std::collections::HashSet;
use std::io::{self, BufRead, Write};

/// Questions put to the person running a merge.
pub trait Prompter {
    /// Show text without expecting an answer.
    fn show(&mut self, text: &str) -> io::Result<()>;

    /// Pick one of `options`; returns its index.
    fn choose(&mut self, question: &str, options: &[String]) -> io::Result<usize>;

    /// Free-form answer; never empty.
    fn input(&mut self, question: &str) -> io::Result<String>;

    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool>;
}

/// Ask for a key until the answer is not in `taken`.
pub fn ask_new_key(prompter: &mut dyn Prompter, taken: &HashSet<String>) -> io::Result<String> {
    loop {
        let key = prompter.input("Enter a new key")?;
        if !taken.contains(&key) {
            return Ok(key);
        }
        prompter.show("That key already exists. Please enter another.")?;
    }
}

/// Line-oriented prompts on a reader/writer pair, normally stdin and stdout.
pub struct TerminalPrompter<R, W> {
    reader: R,
    writer: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn read_answer(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn show(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", text)?;
        self.writer.flush()
    }

    fn choose(&mut self, question: &str, options: &[String]) -> io::Result<usize> {
        loop {
            writeln!(self.writer, "{}", question)?;
            for (idx, option) in options.iter().enumerate() {
                writeln!(self.writer, "  {}: {}", idx + 1, option)?;
            }
            write!(self.writer, "Enter a number: ")?;
            self.writer.flush()?;
            let answer = self.read_answer()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.writer, "Please enter a number between 1 and {}", options.len())?,
            }
        }
    }

    fn input(&mut self, question: &str) -> io::Result<String> {
        loop {
            write!(self.writer, "{}: ", question)?;
            self.writer.flush()?;
            let answer = self.read_answer()?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            write!(self.writer, "{} {} ", question, hint)?;
            self.writer.flush()?;
            match self.read_answer()?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.writer, "Please answer y or n")?,
            }
        }
    }
}
