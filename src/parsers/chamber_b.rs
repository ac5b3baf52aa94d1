//! Chamber B's HTML listing and detail page layout (C3). Chamber B numbers
//! its listing columns differently from chamber A and uses a slightly
//! different header vocabulary, hence a separate parser sharing the same
//! [`ChamberParser`] machinery.

use crate::model::Chamber;
use crate::parsers::ChamberParser;

pub struct ChamberBParser;

impl ChamberParser for ChamberBParser {
    const CHAMBER: Chamber = Chamber::B;
    const HEADER_TERMS: &'static [&'static str] = &["番号", "法律案件名", "提出会派", "審議状況"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_rows_skipping_header() {
        let html = r#"
            <table>
              <tr><th>番号</th><th>法律案件名</th><th>審議状況</th><th>提出会派</th></tr>
              <tr><td>H-217-1</td><td>デジタル社会形成基本法案</td><td>審議中</td><td>議員提出</td></tr>
            </table>
        "#;
        let seeds = ChamberBParser::parse_index(html);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].bill_id, "H-217-1");
    }
}
