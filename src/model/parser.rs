// SPDX-License-Identifier: Apache-2.0

//! Parser for the text form produced by `Subnet::to_string`.

use crate::model::object::{ObjectStore, SubnetId};
use crate::model::subnet::{Cell, Link, Subnet};

#[derive(Debug)]
pub struct ParseError {
    msg: String,
}

impl ParseError {
    fn new(msg: String) -> Self {
        Self { msg }
    }

    fn new_with_pos(msg: String, input: &str, pos: usize) -> Self {
        let mut line = 1usize;
        let mut col = 1usize;
        for ch in input[..pos].chars() {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Self {
            msg: format!("{} at line {}, column {}", msg, line, col),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParseError: {}", self.msg)
    }
}

impl std::error::Error for ParseError {}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn drop_ws(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn try_drop(&mut self, tok: &str) -> bool {
        self.drop_ws();
        if self.rest().starts_with(tok) {
            self.pos += tok.len();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: &str) -> ParseError {
        ParseError::new_with_pos(msg.to_string(), self.input, self.pos)
    }

    fn drop_or_error(&mut self, tok: &str) -> Result<(), ParseError> {
        if self.try_drop(tok) {
            Ok(())
        } else {
            let got: String = self.rest().chars().take(tok.len().max(1)).collect();
            Err(self.err(&format!("expected '{}' got '{}...'", tok, got)))
        }
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.drop_ws();
        let start = self.pos;
        match self.rest().chars().next() {
            Some(c) if c.is_alphabetic() || c == '_' => self.pos += c.len_utf8(),
            Some(c) => return Err(self.err(&format!("expected identifier start, got '{}'", c))),
            None => return Err(self.err("unexpected eof")),
        }
        while let Some(c) = self.rest().chars().next() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_number(&mut self) -> Result<u32, ParseError> {
        self.drop_ws();
        let len = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if len == 0 {
            return Err(self.err("expected number"));
        }
        let num = self.rest()[..len]
            .parse::<u32>()
            .map_err(|e| self.err(&format!("bad number: {}", e)))?;
        self.pos += len;
        Ok(num)
    }

    /// `~`? `%idx` (`.port`)?
    fn parse_link(&mut self) -> Result<Link, ParseError> {
        let inv = self.try_drop("~");
        self.drop_or_error("%")?;
        let idx = self.parse_number()?;
        let out = if self.rest().starts_with('.') {
            self.pos += 1;
            let port = self.parse_number()?;
            u16::try_from(port).map_err(|_| self.err(&format!("port {} out of range", port)))?
        } else {
            0
        };
        Ok(Link { idx, out, inv })
    }

    fn parse_subnet(&mut self, store: &ObjectStore) -> Result<Subnet, ParseError> {
        self.drop_or_error("subnet")?;
        self.drop_or_error("{")?;
        let mut cells: Vec<Cell> = Vec::new();
        while !self.try_drop("}") {
            let entry_pos = self.pos;
            self.drop_or_error("%")?;
            let idx = self.parse_number()?;
            if idx as usize != cells.len() {
                return Err(ParseError::new_with_pos(
                    format!("expected entry %{} got %{}", cells.len(), idx),
                    self.input,
                    entry_pos,
                ));
            }
            self.drop_or_error("=")?;
            self.drop_ws();
            let name_pos = self.pos;
            let name = self.parse_identifier()?;
            let type_id = store.find_cell_type(&name).ok_or_else(|| {
                ParseError::new_with_pos(
                    format!("unknown cell type '{}'", name),
                    self.input,
                    name_pos,
                )
            })?;
            let mut links = Vec::new();
            if self.try_drop("(") {
                if !self.try_drop(")") {
                    loop {
                        links.push(self.parse_link()?);
                        if self.try_drop(")") {
                            break;
                        }
                        self.drop_or_error(",")?;
                    }
                }
            }
            let cell_type = store.cell_type(type_id);
            if !cell_type.accepts_arity(links.len()) {
                return Err(ParseError::new_with_pos(
                    format!("'{}' does not accept {} inputs", name, links.len()),
                    self.input,
                    name_pos,
                ));
            }
            cells.push(Cell {
                type_id,
                symbol: cell_type.symbol,
                links,
            });
        }
        self.drop_ws();
        if !self.rest().is_empty() {
            return Err(self.err("trailing input after subnet"));
        }
        let in_num = cells.iter().take_while(|c| c.is_in()).count();
        let out_num = cells.iter().rev().take_while(|c| c.is_out()).count();
        let subnet = Subnet::from_parts_unchecked(cells, in_num, out_num);
        subnet.check_invariants().map_err(ParseError::new)?;
        Ok(subnet)
    }
}

/// Parses one subnet and allocates it in `store`.
pub fn parse_subnet(store: &mut ObjectStore, input: &str) -> Result<SubnetId, ParseError> {
    let subnet = Parser::new(input).parse_subnet(store)?;
    Ok(store.allocate(subnet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builder::SubnetBuilder;
    use crate::model::celltype::CellSymbol;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_round_trips_printer() {
        let mut store = ObjectStore::new();
        let mut builder = SubnetBuilder::new();
        let ins = builder.add_inputs(3);
        let x = builder.add_cell(CellSymbol::Xor, &[ins[0], !ins[1]]);
        let m = builder.add_cell(CellSymbol::Maj, &[x, ins[1], ins[2]]);
        builder.add_output(!m);
        builder.add_output(ins[2]);
        let id = builder.make(&mut store);
        let text = store.subnet(id).to_string(&store);

        let parsed = parse_subnet(&mut store, &text).unwrap();
        assert_eq!(store.subnet(parsed), store.subnet(id));
        assert_eq!(store.subnet(parsed).to_string(&store), text);
    }

    #[test]
    fn test_parse_reports_position_of_unknown_type() {
        let mut store = ObjectStore::new();
        let text = "subnet {\n  %0 = in\n  %1 = frob(%0)\n  %2 = out(%1)\n}\n";
        let err = parse_subnet(&mut store, text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ParseError: unknown cell type 'frob' at line 3, column 8"
        );
    }

    #[test]
    fn test_parse_rejects_forward_link() {
        let mut store = ObjectStore::new();
        let text = "subnet {\n  %0 = in\n  %1 = and(%0, %2)\n  %2 = out(%1)\n}\n";
        let err = parse_subnet(&mut store, text).unwrap_err();
        assert!(err.to_string().contains("links forward"), "{}", err);
    }

    #[test]
    fn test_parse_rejects_out_of_sequence_index() {
        let mut store = ObjectStore::new();
        let text = "subnet {\n  %0 = in\n  %3 = out(%0)\n}\n";
        let err = parse_subnet(&mut store, text).unwrap_err();
        assert!(err.to_string().contains("expected entry %1"), "{}", err);
    }
}
