use super::schema::schema;
use crate::models::RecordType;

/// CSV template: `#` comment lines describing the columns, the header, and
/// one example row. Comment lines are dropped again on import.
pub fn csv_template(record_type: RecordType) -> Result<String, csv::Error> {
    let schema = schema(record_type);

    let optional: Vec<String> = schema
        .optional
        .iter()
        .map(|(name, default)| {
            if default.is_empty() {
                name.to_string()
            } else {
                format!("{} (default {})", name, default)
            }
        })
        .collect();

    let mut output = format!(
        "# {} import template\n# required fields: {}\n# optional fields: {}\n",
        record_type,
        schema.required.join(", "),
        optional.join(", ")
    );

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        schema
            .required
            .iter()
            .chain(schema.optional.iter().map(|(name, _)| name)),
    )?;
    writer.write_record(schema.example)?;
    let body = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;

    output.push_str(&String::from_utf8_lossy(&body));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{plan_import, Detection, ImportOptions};

    #[test]
    fn every_template_round_trips_through_the_importer() {
        for record_type in RecordType::ALL {
            let template = csv_template(record_type).unwrap();
            let plan = plan_import(
                "template.csv",
                template.as_bytes(),
                None,
                &ImportOptions::default(),
            )
            .unwrap();

            assert_eq!(plan.detection, Detection::Exact(record_type));
            assert_eq!(plan.records.len(), 1, "{record_type}");
            assert!(plan.errors.is_empty(), "{record_type}: {:?}", plan.errors);
            assert_eq!(plan.diagnostics.comment_lines, 3);
        }
    }

    #[test]
    fn budgets_template_lists_required_columns() {
        let template = csv_template(RecordType::Budgets).unwrap();
        assert!(template.contains(
            "# required fields: campaign_id, year, month, platform, operation_type, amount"
        ));
        assert!(template.contains("\ncampaign_id,year,month,platform,operation_type,amount,target_kpi,notes\n"));
    }
}
