use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ProfileConfig;
use crate::model::{ExpenseCategory, IncomeSource, LedgerRecord};
use crate::reference::PopulationReference;
use crate::stats::{mean, std_dev};

// Income structure thresholds.
const WAGE_DOMINANT_SHARE: f64 = 0.6;
const BUSINESS_DOMINANT_SHARE: f64 = 0.5;
const PROPERTY_DRIVEN_SHARE: f64 = 0.3;
const DIVERSIFIED_MAX_SHARE: f64 = 0.6;

// Savings rate tiers.
const HIGH_SAVINGS_RATE: f64 = 0.3;
const STEADY_SAVINGS_RATE: f64 = 0.1;
const BREAK_EVEN_RATE: f64 = -0.1;

// Monthly spend coefficient of variation.
const STABLE_SPENDING_CV: f64 = 0.2;
const VOLATILE_SPENDING_CV: f64 = 0.5;
const MIN_MONTHS_FOR_STABILITY: usize = 3;

// Consumption structure, by share of total spend.
const BASIC_LIVING_FOOD_SHARE: f64 = 0.4;
const DEVELOPMENT_FOOD_SHARE: f64 = 0.2;
const TRANSPORT_RELIANT_SHARE: f64 = 0.2;
const HOUSING_PRESSURE_SHARE: f64 = 0.3;
const EDUCATION_WEIGHTED_SHARE: f64 = 0.15;
const HEALTH_WEIGHTED_SHARE: f64 = 0.15;

// Lifestyle, by share of total spend.
const FAMILY_GROWTH_SHARE: f64 = 0.15;
const SOCIAL_NETWORKING_SHARE: f64 = 0.1;
const DIGITAL_LIFE_SHARE: f64 = 0.15;
const CONVENIENCE_LIVING_SHARE: f64 = 0.08;
const QUALITY_LIVING_SHARE: f64 = 0.08;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelTag {
    Low,
    Medium,
    High,
    InsufficientData,
}

impl LevelTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::InsufficientData => "insufficient-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreferenceTag {
    FoodLover,
    QualityLiving,
    HomeFocused,
    ConvenienceSeeking,
    TransportDependent,
    EducationInvesting,
    HealthFocused,
    SocialGifting,
    PetOwning,
}

impl PreferenceTag {
    pub fn for_category(category: ExpenseCategory) -> Self {
        match category {
            ExpenseCategory::Food => Self::FoodLover,
            ExpenseCategory::Clothing => Self::QualityLiving,
            ExpenseCategory::Housing => Self::HomeFocused,
            ExpenseCategory::HouseholdGoods => Self::ConvenienceSeeking,
            ExpenseCategory::TransportCommunication => Self::TransportDependent,
            ExpenseCategory::EducationRecreation => Self::EducationInvesting,
            ExpenseCategory::Healthcare => Self::HealthFocused,
            ExpenseCategory::OtherGoods => Self::SocialGifting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodLover => "food-lover",
            Self::QualityLiving => "quality-living",
            Self::HomeFocused => "home-focused",
            Self::ConvenienceSeeking => "convenience-seeking",
            Self::TransportDependent => "transport-dependent",
            Self::EducationInvesting => "education-investing",
            Self::HealthFocused => "health-focused",
            Self::SocialGifting => "social-gifting",
            Self::PetOwning => "pet-owning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeTag {
    WageDominated,
    BusinessDominated,
    PropertyDriven,
    Diversified,
    SingleSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinancialHealthTag {
    HighSavings,
    SteadySavings,
    BreakEven,
    DebtDriven,
    StableSpending,
    VolatileSpending,
}

/// Shape of the spending mix. `Balanced` when no other tag applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureTag {
    BasicLiving,
    DevelopmentEnjoyment,
    TransportReliant,
    HousingPressure,
    EducationWeighted,
    HealthWeighted,
    Balanced,
}

impl StructureTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicLiving => "basic-living",
            Self::DevelopmentEnjoyment => "development-enjoyment",
            Self::TransportReliant => "transport-reliant",
            Self::HousingPressure => "housing-pressure",
            Self::EducationWeighted => "education-weighted",
            Self::HealthWeighted => "health-weighted",
            Self::Balanced => "balanced",
        }
    }
}

/// `SimpleLiving` when no other tag applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifestyleTag {
    FamilyGrowth,
    SocialNetworking,
    DigitalLife,
    ConvenienceLiving,
    QualityLiving,
    SimpleLiving,
}

impl LifestyleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FamilyGrowth => "family-growth",
            Self::SocialNetworking => "social-networking",
            Self::DigitalLife => "digital-life",
            Self::ConvenienceLiving => "convenience-living",
            Self::QualityLiving => "quality-living",
            Self::SimpleLiving => "simple-living",
        }
    }
}

impl fmt::Display for LevelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for PreferenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StructureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for LifestyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionProfile {
    /// Always exactly one tag.
    pub level_tags: Vec<LevelTag>,
    pub preference_tags: Vec<PreferenceTag>,
    /// Empty when the window holds no spend.
    pub structure_tags: Vec<StructureTag>,
    /// Empty when the window holds no spend.
    pub lifestyle_tags: Vec<LifestyleTag>,
    pub income_tags: Vec<IncomeTag>,
    pub financial_health_tags: Vec<FinancialHealthTag>,
    /// Category name → share of total spend, categories with spend only.
    pub category_shares: BTreeMap<String, f64>,
}

impl ConsumptionProfile {
    pub fn level(&self) -> LevelTag {
        self.level_tags
            .first()
            .copied()
            .unwrap_or(LevelTag::InsufficientData)
    }

    pub fn has_insufficient_data(&self) -> bool {
        self.level() == LevelTag::InsufficientData
    }
}

/// Derive behavioral tags for one household against the population.
pub fn build_profile(
    records: &[LedgerRecord],
    reference: &PopulationReference,
    config: &ProfileConfig,
) -> ConsumptionProfile {
    let total_spend: f64 = records.iter().filter(|r| r.is_expense()).map(|r| r.amount).sum();
    let total_income: f64 = records.iter().filter(|r| r.is_income()).map(|r| r.amount).sum();

    let mut by_category: BTreeMap<ExpenseCategory, f64> = BTreeMap::new();
    for r in records {
        if let Some(category) = ExpenseCategory::of(r) {
            *by_category.entry(category).or_default() += r.amount;
        }
    }

    let level = level_tag(total_spend, reference);

    let mut preference_tags = Vec::new();
    let mut shares = BTreeMap::new();
    if total_spend > 0.0 {
        for category in ExpenseCategory::ALL {
            let spent = by_category.get(&category).copied().unwrap_or(0.0);
            if spent <= 0.0 {
                continue;
            }
            let share = spent / total_spend;
            shares.insert(category, share);

            let Some(threshold) = reference.share_threshold(category) else {
                continue;
            };
            if share > threshold && share >= config.min_preference_share {
                preference_tags.push(PreferenceTag::for_category(category));
            }
        }
        if pet_spend(records, &config.pet_keywords) > config.pet_spend_floor {
            preference_tags.push(PreferenceTag::PetOwning);
        }
    }

    let (structure, lifestyle) = if total_spend > 0.0 {
        (
            structure_tags(&shares),
            lifestyle_tags(records, &shares, &config.digital_keywords),
        )
    } else {
        (Vec::new(), Vec::new())
    };
    let category_shares = shares
        .iter()
        .map(|(category, share)| (category.to_string(), round_share(*share)))
        .collect();

    let profile = ConsumptionProfile {
        level_tags: vec![level],
        preference_tags,
        structure_tags: structure,
        lifestyle_tags: lifestyle,
        income_tags: income_tags(records, total_income),
        financial_health_tags: financial_health_tags(records, total_income, total_spend),
        category_shares,
    };
    debug!(
        "profile: spend={total_spend:.2} income={total_income:.2} level={level} preferences={}",
        profile.preference_tags.len()
    );
    profile
}

fn level_tag(total_spend: f64, reference: &PopulationReference) -> LevelTag {
    if total_spend <= 0.0 {
        return LevelTag::InsufficientData;
    }
    match reference.spend_breakpoints() {
        None => LevelTag::InsufficientData,
        Some(bp) if total_spend <= bp.low => LevelTag::Low,
        Some(bp) if total_spend <= bp.high => LevelTag::Medium,
        Some(_) => LevelTag::High,
    }
}

fn mentions_any(item_name: &str, keywords: &[String]) -> bool {
    let item = item_name.to_lowercase();
    keywords.iter().any(|k| item.contains(k.to_lowercase().as_str()))
}

fn pet_spend(records: &[LedgerRecord], keywords: &[String]) -> f64 {
    records
        .iter()
        .filter(|r| r.is_expense() && mentions_any(&r.item_name, keywords))
        .map(|r| r.amount)
        .sum()
}

fn structure_tags(shares: &BTreeMap<ExpenseCategory, f64>) -> Vec<StructureTag> {
    let share = |c: ExpenseCategory| shares.get(&c).copied().unwrap_or(0.0);

    let mut tags = Vec::new();
    let food = share(ExpenseCategory::Food);
    if food > BASIC_LIVING_FOOD_SHARE {
        tags.push(StructureTag::BasicLiving);
    } else if food < DEVELOPMENT_FOOD_SHARE {
        tags.push(StructureTag::DevelopmentEnjoyment);
    }
    if share(ExpenseCategory::TransportCommunication) > TRANSPORT_RELIANT_SHARE {
        tags.push(StructureTag::TransportReliant);
    }
    if share(ExpenseCategory::Housing) > HOUSING_PRESSURE_SHARE {
        tags.push(StructureTag::HousingPressure);
    }
    if share(ExpenseCategory::EducationRecreation) > EDUCATION_WEIGHTED_SHARE {
        tags.push(StructureTag::EducationWeighted);
    }
    if share(ExpenseCategory::Healthcare) > HEALTH_WEIGHTED_SHARE {
        tags.push(StructureTag::HealthWeighted);
    }
    if tags.is_empty() {
        tags.push(StructureTag::Balanced);
    }
    tags
}

fn lifestyle_tags(
    records: &[LedgerRecord],
    shares: &BTreeMap<ExpenseCategory, f64>,
    digital_keywords: &[String],
) -> Vec<LifestyleTag> {
    let share = |c: ExpenseCategory| shares.get(&c).copied().unwrap_or(0.0);

    let mut tags = Vec::new();
    if share(ExpenseCategory::EducationRecreation) > FAMILY_GROWTH_SHARE {
        tags.push(LifestyleTag::FamilyGrowth);
    }
    if share(ExpenseCategory::OtherGoods) > SOCIAL_NETWORKING_SHARE {
        tags.push(LifestyleTag::SocialNetworking);
    }
    // Heavy transport/communication spend only counts when some of it is connectivity.
    if share(ExpenseCategory::TransportCommunication) > DIGITAL_LIFE_SHARE
        && records.iter().any(|r| {
            ExpenseCategory::of(r) == Some(ExpenseCategory::TransportCommunication)
                && mentions_any(&r.item_name, digital_keywords)
        })
    {
        tags.push(LifestyleTag::DigitalLife);
    }
    if share(ExpenseCategory::HouseholdGoods) > CONVENIENCE_LIVING_SHARE {
        tags.push(LifestyleTag::ConvenienceLiving);
    }
    if share(ExpenseCategory::Clothing) > QUALITY_LIVING_SHARE {
        tags.push(LifestyleTag::QualityLiving);
    }
    if tags.is_empty() {
        tags.push(LifestyleTag::SimpleLiving);
    }
    tags
}

fn income_tags(records: &[LedgerRecord], total_income: f64) -> Vec<IncomeTag> {
    if total_income <= 0.0 {
        return Vec::new();
    }
    let mut by_source: BTreeMap<IncomeSource, f64> = BTreeMap::new();
    for r in records {
        if let Some(source) = IncomeSource::of(r) {
            *by_source.entry(source).or_default() += r.amount;
        }
    }
    let share = |s: IncomeSource| by_source.get(&s).copied().unwrap_or(0.0) / total_income;

    let mut tags = Vec::new();
    if share(IncomeSource::Wage) > WAGE_DOMINANT_SHARE {
        tags.push(IncomeTag::WageDominated);
    }
    if share(IncomeSource::Business) > BUSINESS_DOMINANT_SHARE {
        tags.push(IncomeTag::BusinessDominated);
    }
    if share(IncomeSource::Property) > PROPERTY_DRIVEN_SHARE {
        tags.push(IncomeTag::PropertyDriven);
    }
    let sources = by_source.values().filter(|v| **v > 0.0).count();
    let max_share = by_source
        .values()
        .map(|v| v / total_income)
        .fold(0.0, f64::max);
    if sources >= 2 && max_share < DIVERSIFIED_MAX_SHARE {
        tags.push(IncomeTag::Diversified);
    }
    if tags.is_empty() {
        tags.push(IncomeTag::SingleSource);
    }
    tags
}

fn financial_health_tags(
    records: &[LedgerRecord],
    total_income: f64,
    total_spend: f64,
) -> Vec<FinancialHealthTag> {
    let mut tags = Vec::new();

    if total_income > 0.0 {
        let savings_rate = (total_income - total_spend) / total_income;
        tags.push(if savings_rate > HIGH_SAVINGS_RATE {
            FinancialHealthTag::HighSavings
        } else if savings_rate > STEADY_SAVINGS_RATE {
            FinancialHealthTag::SteadySavings
        } else if savings_rate > BREAK_EVEN_RATE {
            FinancialHealthTag::BreakEven
        } else {
            FinancialHealthTag::DebtDriven
        });
    }

    let mut monthly: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for r in records.iter().filter(|r| r.is_expense()) {
        *monthly.entry((r.date.year(), r.date.month())).or_default() += r.amount;
    }
    let monthly: Vec<f64> = monthly.into_values().collect();
    let monthly_mean = mean(&monthly);
    if monthly.len() >= MIN_MONTHS_FOR_STABILITY && monthly_mean > 0.0 {
        let cv = std_dev(&monthly) / monthly_mean;
        if cv < STABLE_SPENDING_CV {
            tags.push(FinancialHealthTag::StableSpending);
        } else if cv > VOLATILE_SPENDING_CV {
            tags.push(FinancialHealthTag::VolatileSpending);
        }
    }

    tags
}

fn round_share(share: f64) -> f64 {
    (share * 10_000.0).round() / 10_000.0
}
