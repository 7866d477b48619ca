//! Observable weather state.
//!
//! Holds the fields of the most recent query and notifies registered
//! observers, synchronously and in-thread, after every single mutation.
//! Observers are called with no borrow held, so they may read the getters or
//! issue a new request from inside the callback.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A property exposed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    WeatherDescription,
    Temperature,
    TemperatureFeelLike,
    Humidity,
    WindDirection,
    WindSpeed,
    Active,
    Succeeded,
    Error,
}

impl Property {
    /// The six text fields cleared by every new request.
    pub const WEATHER_FIELDS: [Property; 6] = [
        Property::WeatherDescription,
        Property::Temperature,
        Property::TemperatureFeelLike,
        Property::Humidity,
        Property::WindDirection,
        Property::WindSpeed,
    ];

    /// Name under which the presentation layer binds the property.
    pub const fn name(self) -> &'static str {
        match self {
            Property::WeatherDescription => "weatherDescription",
            Property::Temperature => "temperature",
            Property::TemperatureFeelLike => "temperatureFeelLike",
            Property::Humidity => "humidity",
            Property::WindDirection => "windDirection",
            Property::WindSpeed => "windSpeed",
            Property::Active => "active",
            Property::Succeeded => "succeeded",
            Property::Error => "error",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Flag(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(s) => write!(f, "{:?}", s),
            PropertyValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// One change notification: the property and its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub property: Property,
    pub value: PropertyValue,
}

/// Receives every property change of a [`WeatherState`].
pub trait PropertyObserver {
    fn property_changed(&self, change: &PropertyChange);
}

impl<F> PropertyObserver for F
where
    F: Fn(&PropertyChange),
{
    fn property_changed(&self, change: &PropertyChange) {
        self(change)
    }
}

/// Handle returned by [`WeatherState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Current weather fields and query flags.
///
/// Temperatures, humidity and wind are kept exactly as the provider
/// formatted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeatherReport {
    pub description: String,
    pub temperature_c: String,
    pub feels_like_c: String,
    pub humidity: String,
    pub wind_direction: String,
    pub wind_speed_kph: String,
    pub active: bool,
    pub succeeded: bool,
    pub error: String,
}

impl WeatherReport {
    fn text_mut(&mut self, property: Property) -> Option<&mut String> {
        match property {
            Property::WeatherDescription => Some(&mut self.description),
            Property::Temperature => Some(&mut self.temperature_c),
            Property::TemperatureFeelLike => Some(&mut self.feels_like_c),
            Property::Humidity => Some(&mut self.humidity),
            Property::WindDirection => Some(&mut self.wind_direction),
            Property::WindSpeed => Some(&mut self.wind_speed_kph),
            Property::Error => Some(&mut self.error),
            Property::Active | Property::Succeeded => None,
        }
    }

    fn flag_mut(&mut self, property: Property) -> Option<&mut bool> {
        match property {
            Property::Active => Some(&mut self.active),
            Property::Succeeded => Some(&mut self.succeeded),
            _ => None,
        }
    }

    /// Current value of `property`.
    pub fn value(&self, property: Property) -> PropertyValue {
        match property {
            Property::WeatherDescription => PropertyValue::Text(self.description.clone()),
            Property::Temperature => PropertyValue::Text(self.temperature_c.clone()),
            Property::TemperatureFeelLike => PropertyValue::Text(self.feels_like_c.clone()),
            Property::Humidity => PropertyValue::Text(self.humidity.clone()),
            Property::WindDirection => PropertyValue::Text(self.wind_direction.clone()),
            Property::WindSpeed => PropertyValue::Text(self.wind_speed_kph.clone()),
            Property::Active => PropertyValue::Flag(self.active),
            Property::Succeeded => PropertyValue::Flag(self.succeeded),
            Property::Error => PropertyValue::Text(self.error.clone()),
        }
    }
}

/// The observable state container.
#[derive(Default)]
pub struct WeatherState {
    report: RefCell<WeatherReport>,
    observers: RefCell<Vec<(SubscriptionId, Rc<dyn PropertyObserver>)>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for WeatherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherState")
            .field("report", &*self.report.borrow())
            .field("observers", &self.observers.borrow().len())
            .finish()
    }
}

impl WeatherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Rc<dyn PropertyObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn snapshot(&self) -> WeatherReport {
        self.report.borrow().clone()
    }

    pub fn weather_description(&self) -> String {
        self.report.borrow().description.clone()
    }

    pub fn temperature(&self) -> String {
        self.report.borrow().temperature_c.clone()
    }

    pub fn temperature_feel_like(&self) -> String {
        self.report.borrow().feels_like_c.clone()
    }

    pub fn humidity(&self) -> String {
        self.report.borrow().humidity.clone()
    }

    pub fn wind_direction(&self) -> String {
        self.report.borrow().wind_direction.clone()
    }

    pub fn wind_speed(&self) -> String {
        self.report.borrow().wind_speed_kph.clone()
    }

    pub fn active(&self) -> bool {
        self.report.borrow().active
    }

    pub fn succeeded(&self) -> bool {
        self.report.borrow().succeeded
    }

    pub fn error(&self) -> String {
        self.report.borrow().error.clone()
    }

    pub(crate) fn set_text(&self, property: Property, value: impl Into<String>) {
        let value = {
            let mut report = self.report.borrow_mut();
            match report.text_mut(property) {
                Some(field) => *field = value.into(),
                None => {
                    tracing::warn!("Ignoring text write to flag property '{}'", property);
                    return;
                }
            }
            report.value(property)
        };
        self.publish(PropertyChange { property, value });
    }

    fn set_flag(&self, property: Property, value: bool) {
        let value = {
            let mut report = self.report.borrow_mut();
            match report.flag_mut(property) {
                Some(flag) => *flag = value,
                None => {
                    tracing::warn!("Ignoring flag write to text property '{}'", property);
                    return;
                }
            }
            report.value(property)
        };
        self.publish(PropertyChange { property, value });
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.set_flag(Property::Active, active);
    }

    pub(crate) fn set_succeeded(&self, succeeded: bool) {
        self.set_flag(Property::Succeeded, succeeded);
    }

    pub(crate) fn set_error(&self, error: impl Into<String>) {
        self.set_text(Property::Error, error);
    }

    /// Clear every field and flag, publishing each one.
    pub(crate) fn reset(&self) {
        for property in Property::WEATHER_FIELDS {
            self.set_text(property, "");
        }
        self.set_active(false);
        self.set_succeeded(false);
        self.set_error("");
    }

    fn publish(&self, change: PropertyChange) {
        // Snapshot the list so observers may (un)subscribe while being notified.
        let observers: Vec<Rc<dyn PropertyObserver>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, o)| Rc::clone(o))
            .collect();
        for observer in observers {
            observer.property_changed(&change);
        }
    }
}
