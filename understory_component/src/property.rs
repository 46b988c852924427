// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property keys and the declarative per-type property tables.
//!
//! Every side effect of a property write (dirty marking, layout, triggers, state mirroring) is
//! selected by the flags and hooks of its [`PropDef`]. A component resolves a key by looking in
//! the common table, then its own type table, then the child table supplied by its parent's type.

use core::fmt;

use bitflags::bitflags;
use kurbo::{Affine, Rect};
use taffy::geometry::Point;
use taffy::style::{
    AlignItems, Dimension as LayoutDimension, Display, FlexDirection, FlexWrap, JustifyContent,
    LengthPercentage, LengthPercentageAuto, Overflow, Position, Style,
};
use understory_object::{Color, Dimension, Metrics, Object};

use crate::CoreComponent;

macro_rules! property_keys {
    ($($variant:ident => $name:literal,)*) => {
        /// Every property a component can carry.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum PropertyKey {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl PropertyKey {
            /// The document name of the property.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Looks a key up by its document name. Names are case sensitive.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

property_keys! {
    AccessibilityLabel => "accessibilityLabel",
    AlignItems => "alignItems",
    AlignSelf => "alignSelf",
    BackgroundColor => "backgroundColor",
    BorderColor => "borderColor",
    BorderRadius => "borderRadius",
    BorderWidth => "borderWidth",
    Bottom => "bottom",
    Bounds => "bounds",
    Checked => "checked",
    Color => "color",
    Direction => "direction",
    Disabled => "disabled",
    Display => "display",
    Entities => "entities",
    FontSize => "fontSize",
    Grow => "grow",
    Height => "height",
    Hint => "hint",
    InheritParentState => "inheritParentState",
    InnerBounds => "innerBounds",
    JustifyContent => "justifyContent",
    LaidOut => "laidOut",
    LayoutDirection => "layoutDirection",
    Left => "left",
    MaxHeight => "maxHeight",
    MaxLength => "maxLength",
    MaxLines => "maxLines",
    MaxWidth => "maxWidth",
    MinHeight => "minHeight",
    MinWidth => "minWidth",
    NotifyChildrenChanged => "notifyChildrenChanged",
    OnChildrenChanged => "onChildrenChanged",
    OnMount => "onMount",
    OnPress => "onPress",
    OnSubmit => "onSubmit",
    OnTextChange => "onTextChange",
    Opacity => "opacity",
    Padding => "padding",
    PaddingBottom => "paddingBottom",
    PaddingLeft => "paddingLeft",
    PaddingRight => "paddingRight",
    PaddingTop => "paddingTop",
    Position => "position",
    Preserve => "preserve",
    Right => "right",
    Scale => "scale",
    ScrollDirection => "scrollDirection",
    ScrollPosition => "scrollPosition",
    Shrink => "shrink",
    Source => "source",
    Spacing => "spacing",
    Style => "style",
    Text => "text",
    TextAlign => "textAlign",
    Top => "top",
    Transform => "_transform",
    TransformAssigned => "transform",
    User => "user",
    VisualHash => "_visualHash",
    Width => "width",
    Wrap => "wrap",
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Behaviour switches of a property definition.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PropFlags: u16 {
        /// A missing value is reported on the console.
        const REQUIRED = 0x0001;
        /// Falls back to the component style when not assigned.
        const STYLED = 0x0004;
        /// May be bound to an expression and changed at runtime.
        const DYNAMIC = 0x0008;
        /// Read from the document.
        const IN = 0x0010;
        /// Reported to the view host; changes mark the property dirty.
        const OUT = 0x0020;
        /// Changes are pushed into the layout node.
        const LAYOUT = 0x0040;
        /// Mirrored from the parent when `inheritParentState` is set.
        const MIXED_STATE = 0x0100;
        /// Reset to its default when the component is removed from the tree.
        const RESET_ON_REMOVE = 0x0200;
        /// Engine-maintained state; serialized for the view host even without `OUT`.
        const RUNTIME_STATE = 0x0400;
        /// Bindings nested inside array and map values stay live.
        const EVALUATED = 0x0800;
        /// Changes invalidate the visual context.
        const VISUAL_CONTEXT = 0x1000;
        /// Writes made before the first layout pass are held until that pass completes.
        const SET_AFTER_LAYOUT = 0x2000;
        /// Changes invalidate text measurement.
        const TEXT_HASH = 0x4000;
        /// Feeds the `_visualHash` digest of the rendered appearance.
        const VISUAL_HASH = 0x8000;
    }
}

/// How a raw value is converted into a property value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropKind {
    /// Kept as is.
    Any,
    /// Truthiness.
    Boolean,
    /// Floating point.
    Number,
    /// Truncated integer.
    Integer,
    /// Text.
    String,
    /// Colour.
    Color,
    /// Dimension.
    Dimension,
    /// Rectangle written by the engine.
    Rect,
    /// Array; single values are wrapped.
    Array,
    /// Map.
    Map,
    /// One of a fixed set of names.
    Enum(&'static [&'static str]),
    /// Event handler commands, never evaluated ahead of time.
    Command,
}

impl PropKind {
    /// Converts `value`, or returns `None` if it is not acceptable.
    #[must_use]
    pub fn convert(self, value: &Object, metrics: &Metrics) -> Option<Object> {
        Some(match self {
            Self::Any | Self::Command => value.clone(),
            Self::Boolean => Object::from(value.truthy()),
            Self::Number => Object::from(value.as_number()),
            Self::Integer => Object::from(value.as_int() as f64),
            Self::String => Object::from(value.as_string()),
            Self::Color => Object::from(value.as_color()),
            Self::Dimension => Object::from(value.as_dimension(metrics)),
            Self::Rect => match value {
                Object::Rect(_) => value.clone(),
                _ => Object::from(Rect::ZERO),
            },
            Self::Array if value.is_array() => value.clone(),
            Self::Array => Object::from(value.as_array()),
            Self::Map if value.is_map() => value.clone(),
            Self::Map => return None,
            Self::Enum(names) => {
                let name = value.as_str()?;
                if !names.contains(&name) {
                    return None;
                }
                value.clone()
            }
        })
    }
}

/// Pushes a property value into a layout style.
pub type LayoutFn = fn(&mut Style, &Object, &Metrics);

/// Recomputes state derived from a property after it changed.
pub type TriggerFn = fn(&CoreComponent);

/// One row of a property table.
#[derive(Clone, Copy, Debug)]
pub struct PropDef {
    /// Property key.
    pub key: PropertyKey,
    /// Conversion.
    pub kind: PropKind,
    /// Default value provider.
    pub default: fn() -> Object,
    /// Behaviour switches.
    pub flags: PropFlags,
    /// Post-conversion normalization, e.g. clamping.
    pub calculate: Option<fn(Object) -> Object>,
    /// Layout hook for `LAYOUT` properties.
    pub layout: Option<LayoutFn>,
    /// Hook run after the value changed.
    pub trigger: Option<TriggerFn>,
}

impl PropDef {
    const fn new(key: PropertyKey, kind: PropKind, default: fn() -> Object, flags: PropFlags) -> Self {
        Self {
            key,
            kind,
            default,
            flags,
            calculate: None,
            layout: None,
            trigger: None,
        }
    }

    const fn layout(mut self, layout: LayoutFn) -> Self {
        self.layout = Some(layout);
        self
    }

    const fn trigger(mut self, trigger: TriggerFn) -> Self {
        self.trigger = Some(trigger);
        self
    }

    const fn calculate(mut self, calculate: fn(Object) -> Object) -> Self {
        self.calculate = Some(calculate);
        self
    }

    /// Converts and normalizes a raw value.
    #[must_use]
    pub fn convert(&self, value: &Object, metrics: &Metrics) -> Option<Object> {
        let converted = self.kind.convert(value, metrics)?;
        Some(match self.calculate {
            Some(calculate) => calculate(converted),
            None => converted,
        })
    }

    /// The default value.
    #[must_use]
    pub fn default_value(&self) -> Object {
        (self.default)()
    }
}

/// The component types the builder can instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Flexbox container of any number of children.
    Container,
    /// Decorated box with at most one child.
    Frame,
    /// Measured text.
    Text,
    /// Image reference.
    Image,
    /// Vertically scrolling box with at most one child.
    ScrollView,
    /// Scrolling list of children.
    Sequence,
    /// Pressable wrapper around one child.
    TouchWrapper,
    /// Host-backed text field.
    EditText,
}

impl ComponentType {
    /// Looks a type up by its document name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Container" => Self::Container,
            "Frame" => Self::Frame,
            "Text" => Self::Text,
            "Image" => Self::Image,
            "ScrollView" => Self::ScrollView,
            "Sequence" => Self::Sequence,
            "TouchWrapper" => Self::TouchWrapper,
            "EditText" => Self::EditText,
            _ => return None,
        })
    }

    /// The document name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Container => "Container",
            Self::Frame => "Frame",
            Self::Text => "Text",
            Self::Image => "Image",
            Self::ScrollView => "ScrollView",
            Self::Sequence => "Sequence",
            Self::TouchWrapper => "TouchWrapper",
            Self::EditText => "EditText",
        }
    }

    /// Maximum number of children, or `None` if unbounded.
    #[must_use]
    pub fn max_children(self) -> Option<usize> {
        match self {
            Self::Container | Self::Sequence => None,
            Self::Frame | Self::ScrollView | Self::TouchWrapper => Some(1),
            Self::Text | Self::Image | Self::EditText => Some(0),
        }
    }

    /// Returns `true` if the type has its own scroll position.
    #[must_use]
    pub fn is_scrollable(self) -> bool {
        matches!(self, Self::ScrollView | Self::Sequence)
    }

    /// Returns `true` if the type can take keyboard focus.
    #[must_use]
    pub fn is_focusable(self) -> bool {
        matches!(self, Self::TouchWrapper | Self::EditText)
    }

    /// Returns `true` if layout asks the text measurer for the size.
    #[must_use]
    pub fn measures_text(self) -> bool {
        matches!(self, Self::Text | Self::EditText)
    }

    /// Properties specific to this type.
    #[must_use]
    pub fn own_props(self) -> &'static [PropDef] {
        match self {
            Self::Container => CONTAINER_PROPS,
            Self::Frame => FRAME_PROPS,
            Self::Text => TEXT_PROPS,
            Self::Image => IMAGE_PROPS,
            Self::ScrollView => SCROLL_VIEW_PROPS,
            Self::Sequence => SEQUENCE_PROPS,
            Self::TouchWrapper => TOUCH_WRAPPER_PROPS,
            Self::EditText => EDIT_TEXT_PROPS,
        }
    }

    /// Properties this type supplies to its children.
    #[must_use]
    pub fn child_props(self) -> &'static [PropDef] {
        match self {
            Self::Container => CONTAINER_CHILD_PROPS,
            Self::Sequence => SEQUENCE_CHILD_PROPS,
            _ => &[],
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves `key` for a component of `component_type` whose parent is `parent_type`.
#[must_use]
pub fn find_def(
    component_type: ComponentType,
    parent_type: Option<ComponentType>,
    key: PropertyKey,
) -> Option<&'static PropDef> {
    COMMON_PROPS
        .iter()
        .chain(component_type.own_props())
        .chain(parent_type.map(ComponentType::child_props).unwrap_or_default())
        .find(|def| def.key == key)
}

/// Every definition applying to a component, common ones first.
pub fn all_defs(
    component_type: ComponentType,
    parent_type: Option<ComponentType>,
) -> impl Iterator<Item = &'static PropDef> {
    COMMON_PROPS
        .iter()
        .chain(component_type.own_props())
        .chain(parent_type.map(ComponentType::child_props).unwrap_or_default())
}

#[allow(clippy::cast_possible_truncation, reason = "layout runs in f32")]
pub(crate) fn layout_f32(value: f64) -> f32 {
    value as f32
}

fn layout_dimension(value: &Object, metrics: &Metrics) -> LayoutDimension {
    match value.as_dimension(metrics) {
        Dimension::Auto => LayoutDimension::auto(),
        Dimension::Absolute(v) => LayoutDimension::length(layout_f32(v)),
        Dimension::Relative(p) => LayoutDimension::percent(layout_f32(p / 100.0)),
    }
}

fn layout_inset(value: &Object, metrics: &Metrics) -> LengthPercentageAuto {
    match value.as_dimension(metrics) {
        Dimension::Auto => LengthPercentageAuto::auto(),
        Dimension::Absolute(v) => LengthPercentageAuto::length(layout_f32(v)),
        Dimension::Relative(p) => LengthPercentageAuto::percent(layout_f32(p / 100.0)),
    }
}

fn layout_length(value: &Object, metrics: &Metrics) -> LengthPercentage {
    match value.as_dimension(metrics) {
        Dimension::Auto => LengthPercentage::length(0.0),
        Dimension::Absolute(v) => LengthPercentage::length(layout_f32(v)),
        Dimension::Relative(p) => LengthPercentage::percent(layout_f32(p / 100.0)),
    }
}

fn align(name: &str) -> Option<AlignItems> {
    Some(match name {
        "start" => AlignItems::FlexStart,
        "end" => AlignItems::FlexEnd,
        "center" => AlignItems::Center,
        "baseline" => AlignItems::Baseline,
        "stretch" => AlignItems::Stretch,
        _ => return None,
    })
}

fn flex_direction(name: &str) -> FlexDirection {
    match name {
        "row" | "horizontal" => FlexDirection::Row,
        "rowReverse" => FlexDirection::RowReverse,
        "columnReverse" => FlexDirection::ColumnReverse,
        _ => FlexDirection::Column,
    }
}

fn scroll_overflow(name: &str) -> Point<Overflow> {
    if name == "horizontal" {
        Point {
            x: Overflow::Scroll,
            y: Overflow::Visible,
        }
    } else {
        Point {
            x: Overflow::Visible,
            y: Overflow::Scroll,
        }
    }
}

mod hooks {
    use super::*;

    pub(super) fn width(style: &mut Style, v: &Object, m: &Metrics) {
        style.size.width = layout_dimension(v, m);
    }
    pub(super) fn height(style: &mut Style, v: &Object, m: &Metrics) {
        style.size.height = layout_dimension(v, m);
    }
    pub(super) fn min_width(style: &mut Style, v: &Object, m: &Metrics) {
        style.min_size.width = layout_dimension(v, m);
    }
    pub(super) fn min_height(style: &mut Style, v: &Object, m: &Metrics) {
        style.min_size.height = layout_dimension(v, m);
    }
    pub(super) fn max_width(style: &mut Style, v: &Object, m: &Metrics) {
        style.max_size.width = layout_dimension(v, m);
    }
    pub(super) fn max_height(style: &mut Style, v: &Object, m: &Metrics) {
        style.max_size.height = layout_dimension(v, m);
    }
    pub(super) fn padding_left(style: &mut Style, v: &Object, m: &Metrics) {
        style.padding.left = layout_length(v, m);
    }
    pub(super) fn padding_top(style: &mut Style, v: &Object, m: &Metrics) {
        style.padding.top = layout_length(v, m);
    }
    pub(super) fn padding_right(style: &mut Style, v: &Object, m: &Metrics) {
        style.padding.right = layout_length(v, m);
    }
    pub(super) fn padding_bottom(style: &mut Style, v: &Object, m: &Metrics) {
        style.padding.bottom = layout_length(v, m);
    }
    pub(super) fn border_width(style: &mut Style, v: &Object, m: &Metrics) {
        let width = layout_length(v, m);
        style.border = taffy::geometry::Rect {
            left: width,
            right: width,
            top: width,
            bottom: width,
        };
    }
    pub(super) fn display(style: &mut Style, v: &Object, _: &Metrics) {
        style.display = if v.as_str() == Some("none") {
            Display::None
        } else {
            Display::Flex
        };
    }
    pub(super) fn position(style: &mut Style, v: &Object, _: &Metrics) {
        style.position = if v.as_str() == Some("absolute") {
            Position::Absolute
        } else {
            Position::Relative
        };
    }
    pub(super) fn left(style: &mut Style, v: &Object, m: &Metrics) {
        style.inset.left = layout_inset(v, m);
    }
    pub(super) fn top(style: &mut Style, v: &Object, m: &Metrics) {
        style.inset.top = layout_inset(v, m);
    }
    pub(super) fn right(style: &mut Style, v: &Object, m: &Metrics) {
        style.inset.right = layout_inset(v, m);
    }
    pub(super) fn bottom(style: &mut Style, v: &Object, m: &Metrics) {
        style.inset.bottom = layout_inset(v, m);
    }
    pub(super) fn grow(style: &mut Style, v: &Object, _: &Metrics) {
        style.flex_grow = layout_f32(v.as_number());
    }
    pub(super) fn shrink(style: &mut Style, v: &Object, _: &Metrics) {
        style.flex_shrink = layout_f32(v.as_number());
    }
    pub(super) fn align_self(style: &mut Style, v: &Object, _: &Metrics) {
        style.align_self = v.as_str().and_then(align);
    }
    pub(super) fn align_items(style: &mut Style, v: &Object, _: &Metrics) {
        style.align_items = v.as_str().and_then(align);
    }
    pub(super) fn justify_content(style: &mut Style, v: &Object, _: &Metrics) {
        style.justify_content = Some(match v.as_str().unwrap_or_default() {
            "end" => JustifyContent::FlexEnd,
            "center" => JustifyContent::Center,
            "spaceBetween" => JustifyContent::SpaceBetween,
            "spaceAround" => JustifyContent::SpaceAround,
            "spaceEvenly" => JustifyContent::SpaceEvenly,
            _ => JustifyContent::FlexStart,
        });
    }
    pub(super) fn direction(style: &mut Style, v: &Object, _: &Metrics) {
        style.flex_direction = super::flex_direction(v.as_str().unwrap_or_default());
    }
    pub(super) fn wrap(style: &mut Style, v: &Object, _: &Metrics) {
        style.flex_wrap = match v.as_str().unwrap_or_default() {
            "wrap" => FlexWrap::Wrap,
            "wrapReverse" => FlexWrap::WrapReverse,
            _ => FlexWrap::NoWrap,
        };
    }
    pub(super) fn scroll_direction(style: &mut Style, v: &Object, _: &Metrics) {
        let name = v.as_str().unwrap_or("vertical");
        style.flex_direction = super::flex_direction(name);
        style.overflow = scroll_overflow(name);
    }
    pub(super) fn scroll_view(style: &mut Style, _: &Object, _: &Metrics) {
        style.flex_direction = FlexDirection::Column;
        style.overflow = scroll_overflow("vertical");
    }

    pub(super) fn clamp_opacity(value: Object) -> Object {
        let opacity = value.as_number();
        Object::from(if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) })
    }
    pub(super) fn non_negative(value: Object) -> Object {
        Object::from(value.as_number().max(0.0))
    }

    pub(super) fn state_changed(component: &CoreComponent) {
        component.sync_state_from_properties();
    }
    pub(super) fn visibility_changed(component: &CoreComponent) {
        component.mark_visibility_changed();
    }
    pub(super) fn transform_changed(component: &CoreComponent) {
        component.recompute_transform();
    }
    pub(super) fn style_changed(component: &CoreComponent) {
        component.restyle();
    }
    pub(super) fn scrolled(component: &CoreComponent) {
        component.handle_scroll();
    }
    pub(super) fn spacing_changed(component: &CoreComponent) {
        component.apply_spacing();
    }
    pub(super) fn padding_changed(component: &CoreComponent) {
        component.apply_padding();
    }
}

use hooks::*;
use PropFlags as F;
use PropKind as K;

const DIRECTIONS: &[&str] = &["column", "row", "columnReverse", "rowReverse"];
const ALIGNMENTS: &[&str] = &["stretch", "start", "end", "center", "baseline"];
const SELF_ALIGNMENTS: &[&str] = &["auto", "stretch", "start", "end", "center", "baseline"];
const JUSTIFICATIONS: &[&str] = &["start", "end", "center", "spaceBetween", "spaceAround", "spaceEvenly"];
const WRAPS: &[&str] = &["noWrap", "wrap", "wrapReverse"];
const DISPLAYS: &[&str] = &["normal", "invisible", "none"];
const POSITIONS: &[&str] = &["relative", "absolute", "sticky"];
const LAYOUT_DIRECTIONS: &[&str] = &["LTR", "RTL"];
const TEXT_ALIGNS: &[&str] = &["auto", "left", "center", "right", "start", "end"];
const SCALES: &[&str] = &["bestFit", "bestFill", "fill", "none"];
const SCROLL_DIRECTIONS: &[&str] = &["vertical", "horizontal"];

const STYLED_DYNAMIC: PropFlags = F::IN.union(F::DYNAMIC).union(F::STYLED);
const STYLED_OUT: PropFlags = STYLED_DYNAMIC.union(F::OUT);
const LAYOUT_IN: PropFlags = STYLED_DYNAMIC.union(F::LAYOUT);
const LAYOUT_RESULT: PropFlags = F::OUT.union(F::RUNTIME_STATE).union(F::VISUAL_CONTEXT);

/// The per-side padding properties with their layout hooks, in `padding` array order.
pub(crate) const PADDING_SIDES: [(PropertyKey, LayoutFn); 4] = [
    (PropertyKey::PaddingLeft, padding_left),
    (PropertyKey::PaddingTop, padding_top),
    (PropertyKey::PaddingRight, padding_right),
    (PropertyKey::PaddingBottom, padding_bottom),
];

static COMMON_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::AccessibilityLabel, K::String, || Object::from(""), STYLED_OUT),
    PropDef::new(PropertyKey::Bounds, K::Rect, || Object::from(Rect::ZERO), LAYOUT_RESULT),
    PropDef::new(
        PropertyKey::Checked,
        K::Boolean,
        || Object::from(false),
        F::IN.union(F::DYNAMIC).union(F::OUT).union(F::MIXED_STATE).union(F::VISUAL_CONTEXT),
    )
    .trigger(state_changed),
    PropDef::new(
        PropertyKey::Disabled,
        K::Boolean,
        || Object::from(false),
        F::IN.union(F::DYNAMIC).union(F::OUT).union(F::MIXED_STATE).union(F::VISUAL_CONTEXT),
    )
    .trigger(state_changed),
    PropDef::new(
        PropertyKey::Display,
        K::Enum(DISPLAYS),
        || Object::from("normal"),
        STYLED_OUT.union(F::LAYOUT).union(F::VISUAL_CONTEXT),
    )
    .layout(display)
    .trigger(visibility_changed),
    PropDef::new(
        PropertyKey::Entities,
        K::Array,
        Object::empty_array,
        F::IN.union(F::DYNAMIC).union(F::OUT).union(F::EVALUATED),
    ),
    PropDef::new(PropertyKey::Height, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(height),
    PropDef::new(PropertyKey::Width, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(width),
    PropDef::new(PropertyKey::MinHeight, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(min_height),
    PropDef::new(PropertyKey::MinWidth, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(min_width),
    PropDef::new(PropertyKey::MaxHeight, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(max_height),
    PropDef::new(PropertyKey::MaxWidth, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(max_width),
    PropDef::new(PropertyKey::InheritParentState, K::Boolean, || Object::from(false), F::IN),
    PropDef::new(PropertyKey::InnerBounds, K::Rect, || Object::from(Rect::ZERO), LAYOUT_RESULT),
    PropDef::new(
        PropertyKey::LaidOut,
        K::Boolean,
        || Object::from(false),
        F::RUNTIME_STATE.union(F::RESET_ON_REMOVE),
    ),
    PropDef::new(
        PropertyKey::LayoutDirection,
        K::Enum(LAYOUT_DIRECTIONS),
        || Object::from("LTR"),
        STYLED_OUT.union(F::VISUAL_CONTEXT),
    ),
    PropDef::new(PropertyKey::NotifyChildrenChanged, K::Boolean, || Object::from(false), F::IN),
    PropDef::new(PropertyKey::OnChildrenChanged, K::Command, Object::empty_array, F::IN),
    PropDef::new(PropertyKey::OnMount, K::Command, Object::empty_array, F::IN),
    PropDef::new(
        PropertyKey::Opacity,
        K::Number,
        || Object::from(1.0),
        STYLED_OUT.union(F::VISUAL_CONTEXT),
    )
    .calculate(clamp_opacity)
    .trigger(visibility_changed),
    PropDef::new(PropertyKey::Padding, K::Array, Object::empty_array, STYLED_DYNAMIC)
        .trigger(padding_changed),
    PropDef::new(PropertyKey::PaddingLeft, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(padding_left),
    PropDef::new(PropertyKey::PaddingTop, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(padding_top),
    PropDef::new(PropertyKey::PaddingRight, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(padding_right),
    PropDef::new(PropertyKey::PaddingBottom, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .layout(padding_bottom),
    PropDef::new(PropertyKey::Preserve, K::Array, Object::empty_array, F::IN),
    PropDef::new(PropertyKey::Style, K::String, || Object::from(""), F::IN.union(F::DYNAMIC))
        .trigger(style_changed),
    PropDef::new(
        PropertyKey::TransformAssigned,
        K::Array,
        Object::empty_array,
        STYLED_DYNAMIC.union(F::EVALUATED),
    )
    .trigger(transform_changed),
    PropDef::new(
        PropertyKey::Transform,
        K::Any,
        || Object::from(Affine::IDENTITY),
        F::OUT.union(F::RUNTIME_STATE).union(F::VISUAL_CONTEXT),
    ),
    PropDef::new(PropertyKey::User, K::Map, Object::empty_map, F::IN.union(F::OUT).union(F::DYNAMIC)),
];

static CONTAINER_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::AlignItems, K::Enum(ALIGNMENTS), || Object::from("stretch"), LAYOUT_IN)
        .layout(align_items),
    PropDef::new(PropertyKey::Direction, K::Enum(DIRECTIONS), || Object::from("column"), LAYOUT_IN)
        .layout(direction),
    PropDef::new(PropertyKey::JustifyContent, K::Enum(JUSTIFICATIONS), || Object::from("start"), LAYOUT_IN)
        .layout(justify_content),
    PropDef::new(PropertyKey::Wrap, K::Enum(WRAPS), || Object::from("noWrap"), LAYOUT_IN).layout(wrap),
];

static CONTAINER_CHILD_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::AlignSelf, K::Enum(SELF_ALIGNMENTS), || Object::from("auto"), LAYOUT_IN)
        .layout(align_self),
    PropDef::new(PropertyKey::Bottom, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(bottom),
    PropDef::new(PropertyKey::Grow, K::Number, || Object::from(0.0), LAYOUT_IN).layout(grow),
    PropDef::new(PropertyKey::Left, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN).layout(left),
    PropDef::new(PropertyKey::Position, K::Enum(POSITIONS), || Object::from("relative"), LAYOUT_IN)
        .layout(position),
    PropDef::new(PropertyKey::Right, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN)
        .layout(right),
    PropDef::new(PropertyKey::Shrink, K::Number, || Object::from(0.0), LAYOUT_IN).layout(shrink),
    PropDef::new(PropertyKey::Spacing, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .trigger(spacing_changed),
    PropDef::new(PropertyKey::Top, K::Dimension, || Object::from(Dimension::Auto), LAYOUT_IN).layout(top),
];

static SEQUENCE_CHILD_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::Spacing, K::Dimension, || Object::from(Dimension::Absolute(0.0)), LAYOUT_IN)
        .trigger(spacing_changed),
];

static FRAME_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::BackgroundColor, K::Color, || Object::from(Color::TRANSPARENT), STYLED_OUT),
    PropDef::new(PropertyKey::BorderColor, K::Color, || Object::from(Color::TRANSPARENT), STYLED_OUT),
    PropDef::new(PropertyKey::BorderRadius, K::Dimension, || Object::from(Dimension::Absolute(0.0)), STYLED_OUT),
    PropDef::new(
        PropertyKey::BorderWidth,
        K::Dimension,
        || Object::from(Dimension::Absolute(0.0)),
        STYLED_OUT.union(F::LAYOUT),
    )
    .layout(border_width),
];

const VISUAL_OUT: PropFlags = STYLED_OUT.union(F::VISUAL_HASH);
const TEXT_OUT: PropFlags = VISUAL_OUT.union(F::TEXT_HASH);

const VISUAL_HASH_DIGEST: PropDef =
    PropDef::new(PropertyKey::VisualHash, K::String, || Object::from(""), F::OUT.union(F::RUNTIME_STATE));

static TEXT_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::Color, K::Color, || Object::from(Color::from_rgba(0xfafa_faff)), VISUAL_OUT),
    PropDef::new(PropertyKey::FontSize, K::Dimension, || Object::from(Dimension::Absolute(40.0)), TEXT_OUT),
    PropDef::new(PropertyKey::MaxLines, K::Integer, || Object::from(0), TEXT_OUT).calculate(non_negative),
    PropDef::new(PropertyKey::Text, K::String, || Object::from(""), TEXT_OUT.union(F::VISUAL_CONTEXT)),
    PropDef::new(PropertyKey::TextAlign, K::Enum(TEXT_ALIGNS), || Object::from("auto"), VISUAL_OUT),
    VISUAL_HASH_DIGEST,
];

static IMAGE_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::Scale, K::Enum(SCALES), || Object::from("bestFit"), VISUAL_OUT),
    PropDef::new(
        PropertyKey::Source,
        K::String,
        || Object::from(""),
        VISUAL_OUT.union(F::REQUIRED),
    ),
    VISUAL_HASH_DIGEST,
];

const SCROLL_POSITION: PropDef = PropDef::new(
    PropertyKey::ScrollPosition,
    K::Number,
    || Object::from(0.0),
    F::IN
        .union(F::DYNAMIC)
        .union(F::OUT)
        .union(F::RUNTIME_STATE)
        .union(F::SET_AFTER_LAYOUT)
        .union(F::VISUAL_CONTEXT),
)
.calculate(non_negative)
.trigger(scrolled);

static SCROLL_VIEW_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::ScrollDirection, K::Enum(SCROLL_DIRECTIONS), || Object::from("vertical"), F::IN)
        .layout(scroll_view),
    SCROLL_POSITION,
];

static SEQUENCE_PROPS: &[PropDef] = &[
    PropDef::new(
        PropertyKey::ScrollDirection,
        K::Enum(SCROLL_DIRECTIONS),
        || Object::from("vertical"),
        F::IN.union(F::LAYOUT).union(F::OUT),
    )
    .layout(scroll_direction),
    SCROLL_POSITION,
];

static TOUCH_WRAPPER_PROPS: &[PropDef] = &[PropDef::new(
    PropertyKey::OnPress,
    K::Command,
    Object::empty_array,
    F::IN,
)];

static EDIT_TEXT_PROPS: &[PropDef] = &[
    PropDef::new(PropertyKey::Color, K::Color, || Object::from(Color::from_rgba(0xfafa_faff)), VISUAL_OUT),
    PropDef::new(PropertyKey::FontSize, K::Dimension, || Object::from(Dimension::Absolute(40.0)), TEXT_OUT),
    PropDef::new(PropertyKey::Hint, K::String, || Object::from(""), VISUAL_OUT),
    PropDef::new(PropertyKey::MaxLength, K::Integer, || Object::from(0), STYLED_OUT).calculate(non_negative),
    PropDef::new(PropertyKey::OnSubmit, K::Command, Object::empty_array, F::IN),
    PropDef::new(PropertyKey::OnTextChange, K::Command, Object::empty_array, F::IN),
    PropDef::new(PropertyKey::Text, K::String, || Object::from(""), TEXT_OUT.union(F::VISUAL_CONTEXT)),
    VISUAL_HASH_DIGEST,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for key in [PropertyKey::Text, PropertyKey::ScrollPosition, PropertyKey::TransformAssigned] {
            assert_eq!(PropertyKey::from_name(key.name()), Some(key));
        }
        assert_eq!(PropertyKey::from_name("Text"), None, "names are case sensitive");
    }

    #[test]
    fn lookup_goes_through_the_parent_table() {
        assert!(find_def(ComponentType::Text, None, PropertyKey::Text).is_some());
        assert!(find_def(ComponentType::Frame, None, PropertyKey::Text).is_none());
        assert!(find_def(ComponentType::Text, None, PropertyKey::Grow).is_none());
        let grow = find_def(ComponentType::Text, Some(ComponentType::Container), PropertyKey::Grow);
        assert!(grow.is_some_and(|d| d.flags.contains(PropFlags::LAYOUT)));
        assert!(find_def(ComponentType::Text, Some(ComponentType::Sequence), PropertyKey::Grow).is_none());
    }

    #[test]
    fn enum_values_are_checked() {
        let metrics = Metrics::default();
        let display = find_def(ComponentType::Frame, None, PropertyKey::Display).unwrap();
        assert_eq!(display.convert(&Object::from("none"), &metrics), Some(Object::from("none")));
        assert_eq!(display.convert(&Object::from("hidden"), &metrics), None);
    }

    #[test]
    fn opacity_is_clamped() {
        let metrics = Metrics::default();
        let opacity = find_def(ComponentType::Frame, None, PropertyKey::Opacity).unwrap();
        assert_eq!(opacity.convert(&Object::from(3), &metrics), Some(Object::from(1.0)));
        assert_eq!(opacity.convert(&Object::from(-1), &metrics), Some(Object::from(0.0)));
    }

    #[test]
    fn layout_hooks_write_the_style() {
        let metrics = Metrics::default();
        let mut style = Style::default();
        let width = find_def(ComponentType::Frame, None, PropertyKey::Width).unwrap();
        (width.layout.unwrap())(&mut style, &Object::from("50%"), &metrics);
        assert_eq!(style.size.width, LayoutDimension::percent(0.5));
        let display = find_def(ComponentType::Frame, None, PropertyKey::Display).unwrap();
        (display.layout.unwrap())(&mut style, &Object::from("none"), &metrics);
        assert_eq!(style.display, Display::None);
    }
}
