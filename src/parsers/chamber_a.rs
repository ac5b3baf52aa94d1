//! Chamber A's HTML listing and detail page layout (C2). Chamber A's
//! listing tables use the header vocabulary below; everything else is
//! shared machinery from [`super`].

use crate::model::Chamber;
use crate::parsers::ChamberParser;

pub struct ChamberAParser;

impl ChamberParser for ChamberAParser {
    const CHAMBER: Chamber = Chamber::A;
    const HEADER_TERMS: &'static [&'static str] = &["議案番号", "件名", "提出者", "経過"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_index_rows_skipping_header() {
        let html = r#"
            <table>
              <tr><th>議案番号</th><th>件名</th><th>経過</th><th>提出者</th></tr>
              <tr><td>217-1</td><td><a href="/detail/217-1">デジタル社会形成基本法案</a></td><td>審議中</td><td>内閣提出</td></tr>
            </table>
        "#;
        let seeds = ChamberAParser::parse_index(html);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].bill_id, "217-1");
    }
}
