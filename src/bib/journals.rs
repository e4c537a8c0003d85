use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

// Full names omit a leading "The"; it is stripped from the name being looked up.
// Keep the list in alphabetical order.
const JOURNAL_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Aerosol Science and Technology", "Aerosol Sci. Technol."),
    ("American Journal of Physical Anthropology", "Am. J. Phys. Anthropol."),
    ("Applied Optics", "Appl. Opt."),
    ("Atmospheric Chemistry and Physics", "Atmos. Chem. Phys."),
    ("Atmospheric Chemistry and Physics Discussions", "Atmos. Chem. Phys. Discuss."),
    ("Atmospheric Environment", "Atmos. Environ."),
    ("Atmospheric Measurement Techniques", "Atmos. Meas. Tech."),
    ("Atmospheric Measurement Techniques Discussions", "Atmos. Meas. Tech. Discuss."),
    ("Atmospheric Research", "Atmos. Res."),
    ("Chemical Reviews", "Chem. Rev."),
    ("Climatic Change", "Clim. Change"),
    ("Earth-Science Reviews", "Earth Sci. Rev."),
    ("Environmental Pollution", "Environ. Pollut."),
    ("Environmental Science {\\&} Technology", "Environ. Sci. Technol."),
    ("Faraday Discussions", "Faraday Discuss."),
    ("Geophysical Research Letters", "Geophys. Res. Lett."),
    ("Geoscientific Model Development", "Geosci. Model Dev."),
    ("Geoscientific Model Development Discussions", "Geosci. Model Dev. Discuss."),
    ("Journal of Applied Meteorology and Climatology", "J. Appl. Meterol. Climatol."),
    ("Journal of Chemical Education", "J. Chem. Educ."),
    ("Journal of Chemical Physics", "J. Chem. Phys"),
    ("Journal of Geophysical Research: Atmospheres", "J. Geophys. Res. Atmos."),
    ("Journal of Physical Chemistry A", "J. Phys. Chem. A"),
    ("Journal of Quantitative Spectroscopy and Radiative Transfer", "J. Quant. Spectrosc. Radiat. Transfer"),
    ("Monthly Weather Review", "Mon. Weather Rev."),
    ("Nature", "Nature"),
    ("Nature Chemistry", "Nat. Chem"),
    ("Nature Climate Change", "Nat. Clim. Change"),
    ("Nature Communications", "Nat. Commun."),
    ("Nature Geoscience", "Nat. Geosci."),
    ("Physica D: Nonlinear Phenomena", "Physica D"),
    ("Plant and Soil", "Plant Soil"),
    ("Proceedings of the National Academy of Sciences", "PNAS"),
    ("Proceedings of the {IEEE}", "Proc. IEEE"),
    ("Remote Sensing of Environment", "Remote Sens. Environ."),
    ("Science", "Science"),
    ("{IEEE} Transactions on Geoscience and Remote Sensing", "IEEE Trans. Geosci. Remote Sens."),
    ("{PLoS} Biology", "PLoS Biol."),
];

static ABBREVIATION_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    JOURNAL_ABBREVIATIONS
        .iter()
        .map(|(name, abbrev)| (name.to_lowercase(), *abbrev))
        .collect()
});

static LEADING_THE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^the\s+").expect("Invalid leading article regex pattern"));

/// Abbreviate a journal name, or return it unchanged when it is not in the table.
pub fn abbreviate_journal(journal_name: &str) -> String {
    let trimmed = journal_name.trim();
    let without_article = LEADING_THE_REGEX.replace(trimmed, "");
    match ABBREVIATION_LOOKUP.get(&without_article.to_lowercase()) {
        Some(abbrev) => abbrev.to_string(),
        None => journal_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_article() {
        assert_eq!(abbreviate_journal("The Journal of Chemical Physics"), "J. Chem. Phys");
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(abbreviate_journal("geophysical research letters"), "Geophys. Res. Lett.");
    }

    #[test]
    fn unknown_journal_is_kept() {
        assert_eq!(abbreviate_journal("Journal of Obscure Results"), "Journal of Obscure Results");
    }
}
