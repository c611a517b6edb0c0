// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The info sub-protocol: a request is a newline-separated list of command
//! names carried as the payload of an `Info` envelope; a reply is
//! newline-separated `name<sep>value` lines. The server is known to emit
//! either `\t` or `=` as the separator depending on the command, so replies
//! are normalized to `\t` on the way in. A line with neither separator is
//! rejected rather than guessed at.

use crate::codec::err_codec;
use crate::IoResult;

pub fn encode_request(names: &[&str]) -> Vec<u8> {
    let mut body = names.join("\n");
    if !names.is_empty() {
        body.push('\n');
    }
    body.into_bytes()
}

pub fn decode_reply(payload: &[u8]) -> IoResult<Vec<(String, String)>> {
    let text = std::str::from_utf8(payload).map_err(|e| err_codec(format!("info reply is not utf8: {e}")))?;

    text.lines()
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> IoResult<(String, String)> {
    if let Some((name, value)) = line.split_once('\t') {
        return Ok((name.to_string(), value.to_string()));
    }
    if let Some((name, value)) = line.split_once('=') {
        return Ok((name.to_string(), value.to_string()));
    }
    Err(err_codec(format!("malformed info line, no separator found: {line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request_names() {
        let body = encode_request(&["node", "namespaces"]);
        assert_eq!(body, b"node\nnamespaces\n");
    }

    #[test]
    fn tab_and_equals_both_normalize() {
        let payload = b"node\tBB9\nversion=6.4\n";
        let decoded = decode_reply(payload).unwrap();
        assert_eq!(
            decoded,
            vec![
                ("node".to_string(), "BB9".to_string()),
                ("version".to_string(), "6.4".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_line_without_separator() {
        assert!(decode_reply(b"garbage-without-separator\n").is_err());
    }

    #[test]
    fn skips_blank_lines() {
        let decoded = decode_reply(b"\na=1\n\n").unwrap();
        assert_eq!(decoded, vec![("a".to_string(), "1".to_string())]);
    }
}
