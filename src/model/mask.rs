//! Input masks for Brazilian document and contact numbers.
//!
//! Every mask keeps only the digits of its input, truncates them to the
//! mask's length and inserts each separator once a digit follows it, so
//! partially typed values get partial punctuation and masking a masked
//! value changes nothing.

/// The ASCII digits of `value`.
pub fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Keep at most `max` digits, inserting `sep` before the digit at `pos`.
fn progressive(value: &str, max: usize, separators: &[(usize, &str)]) -> String {
    let mut out = String::new();
    for (i, d) in digits(value).chars().take(max).enumerate() {
        if let Some((_, sep)) = separators.iter().find(|(pos, _)| *pos == i) {
            out.push_str(sep);
        }
        out.push(d);
    }
    out
}

/// `000.000.000-00`
pub fn cpf(value: &str) -> String {
    progressive(value, 11, &[(3, "."), (6, "."), (9, "-")])
}

/// `DD/MM/YYYY`
pub fn date(value: &str) -> String {
    progressive(value, 8, &[(2, "/"), (4, "/")])
}

/// `00000-000`
pub fn cep(value: &str) -> String {
    progressive(value, 5 + 3, &[(5, "-")])
}

/// `0000 0000 0000`
pub fn voter_card(value: &str) -> String {
    progressive(value, 12, &[(4, " "), (8, " ")])
}

/// `000 / 0000`
pub fn zone_section(value: &str) -> String {
    progressive(value, 7, &[(3, " / ")])
}

/// `(00) 0000-0000` or `(00) 00000-0000`. The hyphen always precedes the
/// last four digits, once more than four follow the area code.
pub fn phone(value: &str) -> String {
    let d: String = digits(value).chars().take(11).collect();
    if d.len() <= 2 {
        return d;
    }
    let (area, number) = d.split_at(2);
    if number.len() > 4 {
        let (head, tail) = number.split_at(number.len() - 4);
        format!("({area}) {head}-{tail}")
    } else {
        format!("({area}) {number}")
    }
}
