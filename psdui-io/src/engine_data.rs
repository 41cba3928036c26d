//! 文字图层 `EngineData` 的扫描与生成。
//!
//! 该数据是类 PostScript 的文本字典；这里只提取字体、字号、对齐与填充色，
//! 不构建完整的对象模型。字符串以 `FE FF` 开头时按 UTF-16BE 解码。

use psdui_core::document::TextAttributes;

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Name(&'a [u8]),
    Number(f64),
    Str(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
    Other,
}

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_name(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(byte) = self.peek_byte() {
            if byte.is_ascii_whitespace() || b"/[]()<>".contains(&byte) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_string(&mut self) -> String {
        let mut raw = Vec::new();
        while let Some(byte) = self.peek_byte() {
            self.pos += 1;
            match byte {
                b'\\' => {
                    if let Some(escaped) = self.peek_byte() {
                        raw.push(escaped);
                        self.pos += 1;
                    }
                }
                b')' => break,
                _ => raw.push(byte),
            }
        }
        decode_string(&raw)
    }

    fn read_number(&mut self) -> Token<'a> {
        let start = self.pos;
        while let Some(byte) = self.peek_byte() {
            if !(byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.')) {
                break;
            }
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos])
            .ok()
            .and_then(|text| text.parse::<f64>().ok())
            .map_or(Token::Other, Token::Number)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        while self.peek_byte()?.is_ascii_whitespace() {
            self.pos += 1;
        }
        let byte = self.peek_byte()?;
        let token = match byte {
            b'/' => {
                self.pos += 1;
                Token::Name(self.read_name())
            }
            b'[' => {
                self.pos += 1;
                Token::ArrayStart
            }
            b']' => {
                self.pos += 1;
                Token::ArrayEnd
            }
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.pos += 2;
                Token::DictStart
            }
            b'>' if self.data.get(self.pos + 1) == Some(&b'>') => {
                self.pos += 2;
                Token::DictEnd
            }
            b'(' => {
                self.pos += 1;
                Token::Str(self.read_string())
            }
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => {
                self.pos += 1;
                Token::Other
            }
        };
        Some(token)
    }
}

fn decode_string(raw: &[u8]) -> String {
    match raw {
        [0xfe, 0xff, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => raw.iter().map(|&byte| char::from(byte)).collect(),
    }
}

/// 从 `EngineData` 中提取的样式摘要，字段均取第一次出现的值。
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EngineSummary {
    pub font_names: Vec<String>,
    pub font_index: usize,
    pub font_size: Option<f64>,
    pub justification: Option<i32>,
    /// `[a, r, g, b]`，取值 0..=1。
    pub fill_color: Option<[f64; 4]>,
}

impl EngineSummary {
    pub(crate) fn font_name(&self) -> Option<&str> {
        self.font_names.get(self.font_index).map(String::as_str)
    }
}

pub(crate) fn scan(data: &[u8]) -> EngineSummary {
    let tokens: Vec<Token<'_>> = Lexer::new(data).collect();
    let mut summary = EngineSummary::default();
    let mut font_index = None;

    let mut i = 0;
    while i < tokens.len() {
        if let Token::Name(name) = tokens[i] {
            match name {
                b"FontSet" if summary.font_names.is_empty() => {
                    i = collect_font_names(&tokens, i + 1, &mut summary.font_names);
                    continue;
                }
                b"Font" if font_index.is_none() => {
                    font_index = number_at(&tokens, i + 1).map(|v| v.max(0.0) as usize);
                }
                b"FontSize" if summary.font_size.is_none() => {
                    summary.font_size = number_at(&tokens, i + 1);
                }
                b"Justification" if summary.justification.is_none() => {
                    summary.justification = number_at(&tokens, i + 1).map(|v| v as i32);
                }
                b"FillColor" if summary.fill_color.is_none() => {
                    summary.fill_color = fill_values(&tokens, i + 1);
                }
                _ => {}
            }
        }
        i += 1;
    }
    summary.font_index = font_index.unwrap_or(0);
    summary
}

fn number_at(tokens: &[Token<'_>], index: usize) -> Option<f64> {
    match tokens.get(index) {
        Some(Token::Number(value)) => Some(*value),
        _ => None,
    }
}

/// 收集 `/FontSet [ << /Name (...) >> ... ]` 中的字体名，返回数组之后的位置。
fn collect_font_names(tokens: &[Token<'_>], start: usize, names: &mut Vec<String>) -> usize {
    if tokens.get(start) != Some(&Token::ArrayStart) {
        return start;
    }
    let mut depth = 0usize;
    let mut i = start;
    while i < tokens.len() {
        match &tokens[i] {
            Token::ArrayStart => depth += 1,
            Token::ArrayEnd => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            Token::Name(b"Name") => {
                if let Some(Token::Str(name)) = tokens.get(i + 1) {
                    names.push(name.clone());
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

fn fill_values(tokens: &[Token<'_>], start: usize) -> Option<[f64; 4]> {
    let mut depth = 0usize;
    let mut i = start;
    while i < tokens.len() {
        match &tokens[i] {
            Token::DictStart => depth += 1,
            Token::DictEnd => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return None;
                }
            }
            Token::Name(b"Values") => {
                if tokens.get(i + 1) != Some(&Token::ArrayStart) {
                    return None;
                }
                let mut values = [0.0; 4];
                for (slot, value) in values.iter_mut().enumerate() {
                    *value = number_at(tokens, i + 2 + slot)?;
                }
                return Some(values);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// 生成只包含单一样式段的最小 `EngineData`。
pub(crate) fn render(text: &TextAttributes) -> Vec<u8> {
    let [r, g, b, a] = text.fill_color.to_unit();
    let content = text.content.replace('\n', "\r");

    let mut out = Vec::new();
    out.extend_from_slice(b"\n\n<<\n\t/EngineDict\n\t<<\n\t\t/Editor\n\t\t<<\n\t\t\t/Text ");
    push_string(&mut out, &content);
    out.extend_from_slice(b"\n\t\t>>\n\t\t/ParagraphRun\n\t\t<<\n\t\t\t/RunArray [\n\t\t\t<<\n");
    out.extend_from_slice(b"\t\t\t\t/ParagraphSheet\n\t\t\t\t<<\n\t\t\t\t\t/Properties\n\t\t\t\t\t<<\n");
    out.extend_from_slice(
        format!(
            "\t\t\t\t\t\t/Justification {}\n",
            text.justification.raw()
        )
        .as_bytes(),
    );
    out.extend_from_slice(b"\t\t\t\t\t>>\n\t\t\t\t>>\n\t\t\t>>\n\t\t\t]\n\t\t>>\n");
    out.extend_from_slice(b"\t\t/StyleRun\n\t\t<<\n\t\t\t/RunArray [\n\t\t\t<<\n");
    out.extend_from_slice(b"\t\t\t\t/StyleSheet\n\t\t\t\t<<\n\t\t\t\t\t/StyleSheetData\n\t\t\t\t\t<<\n");
    out.extend_from_slice(b"\t\t\t\t\t\t/Font 0\n");
    out.extend_from_slice(format!("\t\t\t\t\t\t/FontSize {:?}\n", f64::from(text.font_size)).as_bytes());
    out.extend_from_slice(
        format!(
            "\t\t\t\t\t\t/FillColor\n\t\t\t\t\t\t<<\n\t\t\t\t\t\t\t/Type 1\n\t\t\t\t\t\t\t/Values [ {a:?} {r:?} {g:?} {b:?} ]\n\t\t\t\t\t\t>>\n"
        )
        .as_bytes(),
    );
    out.extend_from_slice(b"\t\t\t\t\t>>\n\t\t\t\t>>\n\t\t\t>>\n\t\t\t]\n\t\t>>\n\t>>\n");
    out.extend_from_slice(b"\t/ResourceDict\n\t<<\n\t\t/FontSet [\n\t\t<<\n\t\t\t/Name ");
    push_string(&mut out, &text.font_name);
    out.extend_from_slice(b"\n\t\t\t/Type 0\n\t\t>>\n\t\t]\n\t>>\n>>");
    out
}

/// 以 `(þÿ...)` 形式写出 UTF-16BE 字符串，并转义括号与反斜杠。
fn push_string(out: &mut Vec<u8>, text: &str) {
    out.push(b'(');
    out.extend_from_slice(&[0xfe, 0xff]);
    for byte in text.encode_utf16().flat_map(u16::to_be_bytes) {
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b')');
}
