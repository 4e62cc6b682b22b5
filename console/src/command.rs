//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Operator command line tokenizer

/// One parsed operator command line
///
/// Tokens are whitespace separated. The raw text after any token stays
/// available so commands can take a free-form operand with its spacing
/// intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    raw: &'a str,
    tokens: Vec<(usize, &'a str)>,
}

impl<'a> CommandLine<'a> {
    /// Tokenize a line
    ///
    /// Returns `None` for blank lines and `#` comments.
    pub fn parse(line: &'a str) -> Option<Self> {
        let raw = line.trim_end_matches(['\r', '\n']);
        if raw.trim_start().starts_with('#') {
            return None;
        }

        let mut tokens = Vec::new();
        let mut start = None;
        for (index, ch) in raw.char_indices() {
            if ch.is_whitespace() {
                if let Some(begin) = start.take() {
                    tokens.push((begin, &raw[begin..index]));
                }
            } else if start.is_none() {
                start = Some(index);
            }
        }
        if let Some(begin) = start {
            tokens.push((begin, &raw[begin..]));
        }

        (!tokens.is_empty()).then_some(Self { raw, tokens })
    }

    /// Command name as typed
    pub fn name(&self) -> &'a str {
        self.tokens[0].1
    }

    /// Positional argument `index` (0 is the first token after the name)
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.tokens.get(index + 1).map(|(_, token)| *token)
    }

    /// All positional arguments
    pub fn args(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.tokens[1..].iter().map(|(_, token)| *token)
    }

    /// Number of positional arguments
    pub fn arg_count(&self) -> usize {
        self.tokens.len() - 1
    }

    /// Raw text starting at argument `index`, internal spacing preserved
    ///
    /// Empty when there are not that many arguments.
    pub fn remainder(&self, index: usize) -> &'a str {
        self.tokens
            .get(index + 1)
            .map_or("", |(offset, _)| &self.raw[*offset..])
    }
}
