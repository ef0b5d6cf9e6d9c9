//! Client `business_division` names versus the department codes used in
//! rollups and exports.

const TABLE: [(&str, &str); 4] = [
    ("SO事業部", "SO"),
    ("HO事業部", "HO"),
    ("SLS事業部", "SLS"),
    ("デジタル事業部", "DIGITAL"),
];

pub const UNASSIGNED: &str = "未分類";

/// Department code for a division name; unknown divisions pass through,
/// empty ones become `未分類`.
pub fn department_for(division: &str) -> String {
    let division = division.trim();
    if division.is_empty() {
        return UNASSIGNED.to_string();
    }
    TABLE
        .iter()
        .find(|(name, _)| *name == division)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| division.to_string())
}

/// Division name for a department code or a division name, case-insensitive
/// on the code.
pub fn division_for(department: &str) -> String {
    let department = department.trim();
    TABLE
        .iter()
        .find(|(name, code)| code.eq_ignore_ascii_case(department) || *name == department)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| department.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_directions() {
        assert_eq!(department_for("SO事業部"), "SO");
        assert_eq!(division_for("so"), "SO事業部");
        assert_eq!(division_for("デジタル事業部"), "デジタル事業部");
    }

    #[test]
    fn unknown_names_pass_through() {
        assert_eq!(department_for("新規事業部"), "新規事業部");
        assert_eq!(department_for("  "), UNASSIGNED);
        assert_eq!(division_for("R&D"), "R&D");
    }
}
