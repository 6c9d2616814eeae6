use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::{mask, voter::Voter},
};

/// A WhatsApp deep link carrying a birthday message for a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Greeting {
    pub phone: String,
    pub message: String,
    pub url: String,
}

impl Greeting {
    pub fn birthday(voter: &Voter) -> Result<Self> {
        let phone = whatsapp_number(&voter.phone)
            .ok_or_else(|| Error::bad_request(format!("Voter {} has no phone", voter.name)))?;
        let message = format!(
            "🎉🎂 *Feliz Aniversário, {}!* 🎂🎉\n\n\
             Passando para desejar um dia repleto de alegria, saúde e muitas conquistas. \
             Que este novo ciclo traga grandes realizações!\n\n\
             Conte sempre conosco!\n\n",
            voter.name
        );
        let url = format!("https://wa.me/{phone}?text={}", encode_uri_component(&message));
        Ok(Self {
            phone,
            message,
            url,
        })
    }
}

/// The number in international form. Brazilian numbers (10 or 11 digits)
/// get the country code; so does anything not already starting with it.
fn whatsapp_number(phone: &str) -> Option<String> {
    let digits = mask::digits(phone);
    if digits.is_empty() {
        None
    } else if (10..=11).contains(&digits.len()) || !digits.starts_with("55") {
        Some(format!("55{digits}"))
    } else {
        Some(digits)
    }
}

/// Percent-encode everything but the unreserved URI characters.
pub fn encode_uri_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_code_is_added_when_missing() {
        assert_eq!(whatsapp_number("(11) 98765-4321").unwrap(), "5511987654321");
        assert_eq!(whatsapp_number("(55) 3222-1000").unwrap(), "555532221000");
        assert_eq!(whatsapp_number("5511987654321").unwrap(), "5511987654321");
        assert_eq!(whatsapp_number("123").unwrap(), "55123");
        assert_eq!(whatsapp_number("").as_deref(), None);
    }

    #[test]
    fn greeting_links_to_whatsapp() {
        let voter = Voter::example("u1", "u1");
        let greeting = Greeting::birthday(&voter).unwrap();
        assert_eq!(greeting.phone, "5511987654321");
        assert!(greeting.message.starts_with("🎉🎂 *Feliz Aniversário, Maria da Silva!*"));
        assert!(greeting
            .url
            .starts_with("https://wa.me/5511987654321?text=%F0%9F%8E%89"));
        assert!(!greeting.url.contains(' '));
    }

    #[test]
    fn voters_without_phone_cannot_be_greeted() {
        let mut voter = Voter::example("u1", "u1");
        voter.phone.clear();
        assert!(Greeting::birthday(&voter).is_err());
    }

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(encode_uri_component("a-b_c.d!~*'()"), "a-b_c.d!~*'()");
        assert_eq!(encode_uri_component("a b\n"), "a%20b%0A");
    }
}
