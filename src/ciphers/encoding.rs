// standard base64 alphabet <-> query-string safe alphabet

pub fn to_url_safe(standard: &str) -> String {
    standard.chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            '=' => '~',
            c => c,
        })
        .collect()
}

pub fn from_url_safe(url_safe: &str) -> String {
    url_safe.chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            '~' => '=',
            c => c,
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet() {
        assert_eq!(to_url_safe("ab+c/d=="), "ab-c_d~~");
        assert_eq!(from_url_safe("ab-c_d~~"), "ab+c/d==");
        assert_eq!(to_url_safe("plain"), "plain");
    }
}
