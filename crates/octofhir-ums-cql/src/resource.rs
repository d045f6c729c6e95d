//! Data category to QI-Core resource mapping

use octofhir_ums_ir::DataCategory;

/// How a data category is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceMapping {
    /// Resource type in the retrieve
    pub resource: &'static str,
    /// Query alias
    pub alias: &'static str,
    /// Element carrying the clinically relevant date or period
    pub timing_path: &'static str,
    /// Whether the timing element is an interval rather than a point
    pub interval: bool,
}

/// Retrieve mapping of a category; demographics have none
pub fn mapping_for(category: DataCategory) -> Option<ResourceMapping> {
    let (resource, alias, timing_path, interval) = match category {
        DataCategory::Demographic => return None,
        DataCategory::Condition => ("Condition", "Dx", "prevalenceInterval()", true),
        DataCategory::Encounter => ("Encounter", "Enc", "period", true),
        DataCategory::Procedure => ("Procedure", "Proc", "performed.toInterval()", true),
        DataCategory::Medication => ("MedicationRequest", "Med", "authoredOn", false),
        DataCategory::Observation => ("Observation", "Obs", "effective.toInterval()", true),
        DataCategory::Assessment => ("Observation", "Asmt", "effective.toInterval()", true),
        DataCategory::Immunization => ("Immunization", "Imm", "occurrence.toInterval()", true),
        DataCategory::Allergy => ("AllergyIntolerance", "Alg", "onset.toInterval()", true),
        DataCategory::Device => ("DeviceRequest", "Dev", "authoredOn", false),
        DataCategory::Communication => ("Communication", "Comm", "sent", false),
        DataCategory::Other => ("Observation", "Rec", "effective.toInterval()", true),
    };
    Some(ResourceMapping {
        resource,
        alias,
        timing_path,
        interval,
    })
}
