//! Splitting BibTeX author lists and personal names.

/// A personal name split the way BibTeX does: `First von Last, Jr`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub first: Vec<String>,
    pub von: Vec<String>,
    pub last: Vec<String>,
    pub jr: Vec<String>,
}

impl PersonName {
    pub fn first_joined(&self) -> String {
        self.first.join(" ")
    }

    pub fn von_joined(&self) -> String {
        self.von.join(" ")
    }

    pub fn last_joined(&self) -> String {
        self.last.join(" ")
    }

    pub fn jr_joined(&self) -> String {
        self.jr.join(" ")
    }
}

/// Split `text` on whitespace that is not inside braces.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Split `text` on commas that are not inside braces.
fn split_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current).trim().to_string()),
            c => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Split an `and`-joined author list. `and` inside braces does not split.
pub fn split_authors(authors: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for word in split_words(authors) {
        if word.eq_ignore_ascii_case("and") {
            if !current.is_empty() {
                result.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(word);
        }
    }
    if !current.is_empty() {
        result.push(current.join(" "));
    }
    result
}

/// BibTeX's notion of a lower-case word: the first letter at brace depth zero
/// (or of a `{\cmd x}` special character) is lower case. Words whose letters
/// are all protected by braces are caseless.
fn is_lowercase_word(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '{' {
            if chars.get(i + 1) == Some(&'\\') {
                // special character: skip the command name, look at its argument
                let mut j = i + 2;
                while j < chars.len() && chars[j].is_alphabetic() {
                    j += 1;
                }
                if j == i + 2 {
                    j += 1;
                }
                while j < chars.len() && chars[j] != '}' {
                    if chars[j].is_alphabetic() {
                        return chars[j].is_lowercase();
                    }
                    j += 1;
                }
                i = j;
            } else {
                let mut depth = 0usize;
                while i < chars.len() {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
        } else if c.is_alphabetic() {
            return c.is_lowercase();
        }
        i += 1;
    }
    false
}

/// Split one author name into its four parts.
pub fn split_name(name: &str) -> PersonName {
    let parts = split_commas(name.trim());
    let mut person = PersonName::default();

    match parts.len() {
        0 => {}
        1 => {
            let words = split_words(&parts[0]);
            if words.is_empty() {
                return person;
            }
            let (body, last_word) = words.split_at(words.len() - 1);
            let von_start = body.iter().position(|w| is_lowercase_word(w));
            match von_start {
                Some(start) => {
                    let von_end = body
                        .iter()
                        .rposition(|w| is_lowercase_word(w))
                        .unwrap_or(start);
                    person.first = body[..start].to_vec();
                    person.von = body[start..=von_end].to_vec();
                    person.last = body[von_end + 1..].to_vec();
                }
                None => person.first = body.to_vec(),
            }
            person.last.extend(last_word.iter().cloned());
        }
        n => {
            let words = split_words(&parts[0]);
            if !words.is_empty() {
                let (body, last_word) = words.split_at(words.len() - 1);
                match body.iter().rposition(|w| is_lowercase_word(w)) {
                    Some(von_end) => {
                        person.von = body[..=von_end].to_vec();
                        person.last = body[von_end + 1..].to_vec();
                    }
                    None => person.last = body.to_vec(),
                }
                person.last.extend(last_word.iter().cloned());
            }
            if n == 2 {
                person.first = split_words(&parts[1]);
            } else {
                person.jr = split_words(&parts[1]);
                person.first = split_words(&parts[2..].join(", "));
            }
        }
    }

    person
}
