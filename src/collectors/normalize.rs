/// Collapse runs of whitespace (newlines included) into single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the distance suffix the site appends after the first comma,
/// e.g. `"São Paulo, 3 km de você"` becomes `"São Paulo"`.
pub fn clean_location(location: &str) -> String {
    let head = location.split(',').next().unwrap_or(location);
    clean_text(head)
}

/// Make salary ranges read naturally: `"R$ 2.000 a R$ 3.000"` becomes
/// `"R$ 2.000 até R$ 3.000"`.
pub fn clean_salary(salary: &str) -> String {
    clean_text(salary).replace(" a ", " até ")
}
