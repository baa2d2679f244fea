//! Generic JSON projection of GTFS-RT messages.
//!
//! prost messages carry no runtime reflection, so every message type the
//! feeds carry implements [`Project`], listing its set fields by wire-schema
//! name. [`to_json`] folds a projection into a `serde_json::Value` following
//! the protobuf JSON mapping with original (snake_case) field names:
//!
//! * unset optional fields and empty repeated fields are omitted,
//! * enums are rendered by symbolic name, or by number when unknown,
//! * 64-bit integers are rendered as decimal strings,
//! * `float` fields use the shortest decimal that round-trips as `f32`,
//! * keys appear in field-number order.

use serde_json::{Map, Number, Value};

use crate::gtfs_rt::{
    Alert, EntitySelector, FeedEntity, Position, ReplacementStop, Shape, Stop, StopSelector,
    TimeRange, TranslatedImage, TranslatedString, TripDescriptor, TripModifications, TripUpdate,
    VehicleDescriptor, VehiclePosition, alert, feed_header, stop, translated_image,
    translated_string, trip_descriptor, trip_modifications, trip_update, vehicle_descriptor,
    vehicle_position,
};

/// A leaf value of a projected message.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'a> {
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float(f64),
    Str(&'a str),
    Enum {
        name: Option<&'static str>,
        number: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Scalar(Scalar<'a>),
    Message(Vec<Field<'a>>),
    Repeated(Vec<FieldValue<'a>>),
}

pub type Field<'a> = (&'static str, FieldValue<'a>);

/// A message that can list its populated fields.
pub trait Project {
    /// Set fields as `(wire name, value)` pairs, in field-number order.
    fn fields(&self) -> Vec<Field<'_>>;
}

/// Projects `msg` to a JSON object.
pub fn to_json<P: Project + ?Sized>(msg: &P) -> Value {
    fields_to_json(msg.fields())
}

pub fn fields_to_json(fields: Vec<Field<'_>>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value_to_json(value)))
        .collect();
    Value::Object(map)
}

/// Looks up a top-level string field by name.
pub fn str_field<'a>(fields: &[Field<'a>], name: &str) -> Option<&'a str> {
    fields.iter().find_map(|(field, value)| match value {
        FieldValue::Scalar(Scalar::Str(s)) if *field == name => Some(*s),
        _ => None,
    })
}

fn value_to_json(value: FieldValue<'_>) -> Value {
    match value {
        FieldValue::Scalar(scalar) => scalar_to_json(scalar),
        FieldValue::Message(fields) => fields_to_json(fields),
        FieldValue::Repeated(items) => Value::Array(items.into_iter().map(value_to_json).collect()),
    }
}

fn scalar_to_json(scalar: Scalar<'_>) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Bool(b),
        Scalar::Int32(n) => Value::from(n),
        Scalar::UInt32(n) => Value::from(n),
        Scalar::Int64(n) => Value::String(n.to_string()),
        Scalar::UInt64(n) => Value::String(n.to_string()),
        // Widening to f64 would print the binary expansion (38.62699890136719);
        // going through the shortest f32 text keeps 38.627.
        Scalar::Float32(f) => match f.to_string().parse::<f64>() {
            Ok(shortest) => float_to_json(shortest),
            Err(_) => float_to_json(f64::from(f)),
        },
        Scalar::Float(f) => float_to_json(f),
        Scalar::Str(s) => Value::from(s),
        Scalar::Enum {
            name: Some(name), ..
        } => Value::from(name),
        Scalar::Enum { name: None, number } => Value::from(number),
    }
}

fn float_to_json(f: f64) -> Value {
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        None if f.is_nan() => Value::from("NaN"),
        None if f > 0.0 => Value::from("Infinity"),
        None => Value::from("-Infinity"),
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Scalar<'_> {
            fn from(v: $ty) -> Self {
                Scalar::$variant(v.into())
            }
        })*
    };
}

scalar_from! {
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float,
}

impl<'a> From<&'a str> for Scalar<'a> {
    fn from(s: &'a str) -> Self {
        Scalar::Str(s)
    }
}

/// Symbolic name of a generated protobuf enum value.
pub trait EnumName: TryFrom<i32> {
    fn name(self) -> &'static str;
}

macro_rules! enum_names {
    ($($ty:ty),* $(,)?) => {
        $(impl EnumName for $ty {
            fn name(self) -> &'static str {
                self.as_str_name()
            }
        })*
    };
}

enum_names! {
    feed_header::Incrementality,
    trip_update::stop_time_update::ScheduleRelationship,
    trip_update::stop_time_update::stop_time_properties::DropOffPickupType,
    vehicle_position::VehicleStopStatus,
    vehicle_position::CongestionLevel,
    vehicle_position::OccupancyStatus,
    alert::Cause,
    alert::Effect,
    alert::SeverityLevel,
    trip_descriptor::ScheduleRelationship,
    vehicle_descriptor::WheelchairAccessible,
    stop::WheelchairBoarding,
}

/// Builder used by [`Project`] impls to collect set fields.
#[derive(Debug, Default)]
pub struct FieldSet<'a>(Vec<Field<'a>>);

impl<'a> FieldSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A required scalar; always present.
    pub fn required(mut self, name: &'static str, value: impl Into<Scalar<'a>>) -> Self {
        self.0.push((name, FieldValue::Scalar(value.into())));
        self
    }

    /// A required string. An unset required string decodes as empty, so
    /// empty is treated as absent.
    pub fn text(self, name: &'static str, value: &'a str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.required(name, value)
        }
    }

    pub fn optional<T: Into<Scalar<'a>>>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.required(name, v),
            None => self,
        }
    }

    pub fn enumeration<E: EnumName>(mut self, name: &'static str, value: Option<i32>) -> Self {
        if let Some(number) = value {
            let symbol = E::try_from(number).ok().map(EnumName::name);
            self.0.push((
                name,
                FieldValue::Scalar(Scalar::Enum {
                    name: symbol,
                    number,
                }),
            ));
        }
        self
    }

    pub fn message<M: Project>(mut self, name: &'static str, value: Option<&'a M>) -> Self {
        if let Some(msg) = value {
            self.0.push((name, FieldValue::Message(msg.fields())));
        }
        self
    }

    pub fn repeated<M: Project>(mut self, name: &'static str, values: &'a [M]) -> Self {
        if !values.is_empty() {
            let items = values
                .iter()
                .map(|m| FieldValue::Message(m.fields()))
                .collect();
            self.0.push((name, FieldValue::Repeated(items)));
        }
        self
    }

    pub fn repeated_text(mut self, name: &'static str, values: &'a [String]) -> Self {
        if !values.is_empty() {
            let items = values
                .iter()
                .map(|s| FieldValue::Scalar(Scalar::Str(s)))
                .collect();
            self.0.push((name, FieldValue::Repeated(items)));
        }
        self
    }

    pub fn build(self) -> Vec<Field<'a>> {
        self.0
    }
}

impl Project for FeedEntity {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .text("id", &self.id)
            .optional("is_deleted", self.is_deleted)
            .message("trip_update", self.trip_update.as_ref())
            .message("vehicle", self.vehicle.as_ref())
            .message("alert", self.alert.as_ref())
            .message("shape", self.shape.as_ref())
            .message("stop", self.stop.as_ref())
            .message("trip_modifications", self.trip_modifications.as_ref())
            .build()
    }
}

impl Project for TripUpdate {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .message("trip", Some(&self.trip))
            .repeated("stop_time_update", &self.stop_time_update)
            .message("vehicle", self.vehicle.as_ref())
            .optional("timestamp", self.timestamp)
            .optional("delay", self.delay)
            .message("trip_properties", self.trip_properties.as_ref())
            .build()
    }
}

impl Project for trip_update::StopTimeEvent {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("delay", self.delay)
            .optional("time", self.time)
            .optional("uncertainty", self.uncertainty)
            .optional("scheduled_time", self.scheduled_time)
            .build()
    }
}

impl Project for trip_update::StopTimeUpdate {
    fn fields(&self) -> Vec<Field<'_>> {
        use trip_update::stop_time_update::ScheduleRelationship;

        FieldSet::new()
            .optional("stop_sequence", self.stop_sequence)
            .message("arrival", self.arrival.as_ref())
            .message("departure", self.departure.as_ref())
            .optional("stop_id", self.stop_id.as_deref())
            .enumeration::<ScheduleRelationship>(
                "schedule_relationship",
                self.schedule_relationship,
            )
            .message("stop_time_properties", self.stop_time_properties.as_ref())
            .enumeration::<vehicle_position::OccupancyStatus>(
                "departure_occupancy_status",
                self.departure_occupancy_status,
            )
            .build()
    }
}

impl Project for trip_update::stop_time_update::StopTimeProperties {
    fn fields(&self) -> Vec<Field<'_>> {
        use trip_update::stop_time_update::stop_time_properties::DropOffPickupType;

        FieldSet::new()
            .optional("assigned_stop_id", self.assigned_stop_id.as_deref())
            .optional("stop_headsign", self.stop_headsign.as_deref())
            .enumeration::<DropOffPickupType>("pickup_type", self.pickup_type)
            .enumeration::<DropOffPickupType>("drop_off_type", self.drop_off_type)
            .build()
    }
}

impl Project for trip_update::TripProperties {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("trip_id", self.trip_id.as_deref())
            .optional("start_date", self.start_date.as_deref())
            .optional("start_time", self.start_time.as_deref())
            .optional("shape_id", self.shape_id.as_deref())
            .optional("trip_headsign", self.trip_headsign.as_deref())
            .optional("trip_short_name", self.trip_short_name.as_deref())
            .build()
    }
}

impl Project for VehiclePosition {
    fn fields(&self) -> Vec<Field<'_>> {
        use vehicle_position::{CongestionLevel, OccupancyStatus, VehicleStopStatus};

        FieldSet::new()
            .message("trip", self.trip.as_ref())
            .message("position", self.position.as_ref())
            .optional("current_stop_sequence", self.current_stop_sequence)
            .enumeration::<VehicleStopStatus>("current_status", self.current_status)
            .optional("timestamp", self.timestamp)
            .enumeration::<CongestionLevel>("congestion_level", self.congestion_level)
            .optional("stop_id", self.stop_id.as_deref())
            .message("vehicle", self.vehicle.as_ref())
            .enumeration::<OccupancyStatus>("occupancy_status", self.occupancy_status)
            .optional("occupancy_percentage", self.occupancy_percentage)
            .repeated("multi_carriage_details", &self.multi_carriage_details)
            .build()
    }
}

impl Project for vehicle_position::CarriageDetails {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("id", self.id.as_deref())
            .optional("label", self.label.as_deref())
            .enumeration::<vehicle_position::OccupancyStatus>(
                "occupancy_status",
                self.occupancy_status,
            )
            .optional("occupancy_percentage", self.occupancy_percentage)
            .optional("carriage_sequence", self.carriage_sequence)
            .build()
    }
}

impl Project for Alert {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .repeated("active_period", &self.active_period)
            .repeated("informed_entity", &self.informed_entity)
            .enumeration::<alert::Cause>("cause", self.cause)
            .enumeration::<alert::Effect>("effect", self.effect)
            .message("url", self.url.as_ref())
            .message("header_text", self.header_text.as_ref())
            .message("description_text", self.description_text.as_ref())
            .message("tts_header_text", self.tts_header_text.as_ref())
            .message("tts_description_text", self.tts_description_text.as_ref())
            .enumeration::<alert::SeverityLevel>("severity_level", self.severity_level)
            .message("image", self.image.as_ref())
            .message("image_alternative_text", self.image_alternative_text.as_ref())
            .message("cause_detail", self.cause_detail.as_ref())
            .message("effect_detail", self.effect_detail.as_ref())
            .build()
    }
}

impl Project for TimeRange {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("start", self.start)
            .optional("end", self.end)
            .build()
    }
}

impl Project for Position {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .required("latitude", self.latitude)
            .required("longitude", self.longitude)
            .optional("bearing", self.bearing)
            .optional("odometer", self.odometer)
            .optional("speed", self.speed)
            .build()
    }
}

impl Project for TripDescriptor {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("trip_id", self.trip_id.as_deref())
            .optional("start_time", self.start_time.as_deref())
            .optional("start_date", self.start_date.as_deref())
            .enumeration::<trip_descriptor::ScheduleRelationship>(
                "schedule_relationship",
                self.schedule_relationship,
            )
            .optional("route_id", self.route_id.as_deref())
            .optional("direction_id", self.direction_id)
            .message("modified_trip", self.modified_trip.as_ref())
            .build()
    }
}

impl Project for trip_descriptor::ModifiedTripSelector {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("modification_id", self.modification_id.as_deref())
            .optional("affected_trip_id", self.affected_trip_id.as_deref())
            .optional("start_time", self.start_time.as_deref())
            .optional("start_date", self.start_date.as_deref())
            .build()
    }
}

impl Project for VehicleDescriptor {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("id", self.id.as_deref())
            .optional("label", self.label.as_deref())
            .optional("license_plate", self.license_plate.as_deref())
            .enumeration::<vehicle_descriptor::WheelchairAccessible>(
                "wheelchair_accessible",
                self.wheelchair_accessible,
            )
            .build()
    }
}

impl Project for EntitySelector {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("agency_id", self.agency_id.as_deref())
            .optional("route_id", self.route_id.as_deref())
            .optional("route_type", self.route_type)
            .message("trip", self.trip.as_ref())
            .optional("stop_id", self.stop_id.as_deref())
            .optional("direction_id", self.direction_id)
            .build()
    }
}

impl Project for TranslatedString {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .repeated("translation", &self.translation)
            .build()
    }
}

impl Project for translated_string::Translation {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .text("text", &self.text)
            .optional("language", self.language.as_deref())
            .build()
    }
}

impl Project for TranslatedImage {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .repeated("localized_image", &self.localized_image)
            .build()
    }
}

impl Project for translated_image::LocalizedImage {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .text("url", &self.url)
            .text("media_type", &self.media_type)
            .optional("language", self.language.as_deref())
            .build()
    }
}

impl Project for Shape {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("shape_id", self.shape_id.as_deref())
            .optional("encoded_polyline", self.encoded_polyline.as_deref())
            .build()
    }
}

impl Project for Stop {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("stop_id", self.stop_id.as_deref())
            .message("stop_code", self.stop_code.as_ref())
            .message("stop_name", self.stop_name.as_ref())
            .message("tts_stop_name", self.tts_stop_name.as_ref())
            .message("stop_desc", self.stop_desc.as_ref())
            .optional("stop_lat", self.stop_lat)
            .optional("stop_lon", self.stop_lon)
            .optional("zone_id", self.zone_id.as_deref())
            .message("stop_url", self.stop_url.as_ref())
            .optional("parent_station", self.parent_station.as_deref())
            .optional("stop_timezone", self.stop_timezone.as_deref())
            .enumeration::<stop::WheelchairBoarding>(
                "wheelchair_boarding",
                self.wheelchair_boarding,
            )
            .optional("level_id", self.level_id.as_deref())
            .message("platform_code", self.platform_code.as_ref())
            .build()
    }
}

impl Project for TripModifications {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .repeated("selected_trips", &self.selected_trips)
            .repeated_text("start_times", &self.start_times)
            .repeated_text("service_dates", &self.service_dates)
            .repeated("modifications", &self.modifications)
            .build()
    }
}

impl Project for trip_modifications::SelectedTrips {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .repeated_text("trip_ids", &self.trip_ids)
            .optional("shape_id", self.shape_id.as_deref())
            .build()
    }
}

impl Project for trip_modifications::Modification {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .message("start_stop_selector", self.start_stop_selector.as_ref())
            .message("end_stop_selector", self.end_stop_selector.as_ref())
            .optional(
                "propagated_modification_delay",
                self.propagated_modification_delay,
            )
            .repeated("replacement_stops", &self.replacement_stops)
            .optional("service_alert_id", self.service_alert_id.as_deref())
            .optional("last_modified_time", self.last_modified_time)
            .build()
    }
}

impl Project for StopSelector {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("stop_sequence", self.stop_sequence)
            .optional("stop_id", self.stop_id.as_deref())
            .build()
    }
}

impl Project for ReplacementStop {
    fn fields(&self) -> Vec<Field<'_>> {
        FieldSet::new()
            .optional("travel_time_to_stop", self.travel_time_to_stop)
            .optional("stop_id", self.stop_id.as_deref())
            .build()
    }
}
