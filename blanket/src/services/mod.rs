pub mod effects;
pub mod form;
pub mod formset;
pub mod lookup_client;
pub mod metrics;
pub mod money;
pub mod required;
pub mod resolver;
pub mod tariff;
pub mod validation;
