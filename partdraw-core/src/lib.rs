pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，单位为毫米。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn origin() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Self {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，提供标注计算所需的基础运算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        /// 单位化；零向量返回 `None`。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        /// 逆时针旋转 90° 得到的左手法向。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 相对 X 轴的角度（弧度）。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于写出 `$EXTMIN/$EXTMAX` 以及校验标注位置。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 点是否落在框内（含边界）。
        pub fn contains(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    /// AutoCAD 颜色索引（ACI）中的白/黑色，作为图层缺省颜色。
    pub const DEFAULT_LAYER_COLOR: i16 = 7;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub color: i16,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self::with_color(name, DEFAULT_LAYER_COLOR)
        }

        #[inline]
        pub fn with_color(name: impl Into<String>, color: i16) -> Self {
            Self {
                name: name.into(),
                color,
                is_visible: true,
            }
        }
    }

    /// 标注样式。除文字高度外，其余尺寸均按文字高度等比推导，
    /// 与公制模板（DIMTXT=2.5, DIMASZ=2.5, DIMEXO=0.625, DIMEXE=1.25, DIMGAP=0.625）保持相同比例。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct DimensionStyle {
        pub name: String,
        pub text_height: f64,
        pub arrow_size: f64,
        pub extension_offset: f64,
        pub extension_extend: f64,
        pub text_gap: f64,
    }

    impl DimensionStyle {
        pub fn scaled(name: impl Into<String>, text_height: f64) -> Self {
            Self {
                name: name.into(),
                text_height,
                arrow_size: text_height,
                extension_offset: text_height * 0.25,
                extension_extend: text_height * 0.5,
                text_gap: text_height * 0.25,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Polyline(Polyline),
        Text(Text),
        Dimension(Dimension),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Text(text) => &text.layer,
                Entity::Dimension(dimension) => &dimension.layer,
            }
        }

        /// 计算实体的 2D 轴对齐范围，文字退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                Entity::Text(text) => {
                    bounds.include_point(text.insert);
                }
                Entity::Dimension(dimension) => {
                    bounds.include_point(dimension.definition_point);
                    bounds.include_point(dimension.text_midpoint);
                    bounds.include_point(dimension.extension_line_origin);
                    bounds.include_point(dimension.extension_line_end);
                    bounds.include_point(dimension.dimension_line_start());
                }
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 单行文字，插入点为左下角（左对齐）。旋转角以弧度储存。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum DimensionKind {
        Linear,
        Aligned,
        Unknown(i16),
    }

    impl DimensionKind {
        /// DXF 组码 70 的低位类型值。
        pub fn type_code(self) -> i16 {
            match self {
                DimensionKind::Linear => 0,
                DimensionKind::Aligned => 1,
                DimensionKind::Unknown(code) => code,
            }
        }

        pub fn from_type_code(code: i16) -> Self {
            match code & 0x0F {
                0 => DimensionKind::Linear,
                1 => DimensionKind::Aligned,
                other => DimensionKind::Unknown(other),
            }
        }
    }

    /// 标注实体。`extension_line_origin`/`extension_line_end` 为被测两点，
    /// `definition_point` 位于尺寸线上、靠近第二测量点一侧。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Dimension {
        pub kind: DimensionKind,
        pub definition_point: Point2,
        pub text_midpoint: Point2,
        pub extension_line_origin: Point2,
        pub extension_line_end: Point2,
        pub text: Option<String>,
        pub measurement: f64,
        pub rotation: f64,
        pub style_name: String,
        pub layer: String,
    }

    impl Dimension {
        /// 构造对齐标注：`distance` 沿 p1→p2 的左手法向偏移，负值落在右侧。
        /// 文字中点位于尺寸线外侧，距离为 `text_gap + text_height / 2`。
        pub fn aligned(
            p1: Point2,
            p2: Point2,
            distance: f64,
            style: &DimensionStyle,
            layer: impl Into<String>,
        ) -> Self {
            let direction = Vector2::from_points(p1, p2);
            let normal = direction
                .normalize()
                .map(Vector2::perp)
                .unwrap_or(Vector2::new(0.0, 1.0));
            let offset = normal.scale(distance);
            let line_start = p1.translate(offset);
            let line_end = p2.translate(offset);
            let outward = if distance < 0.0 {
                normal.scale(-1.0)
            } else {
                normal
            };
            let text_midpoint = line_start
                .midpoint(line_end)
                .translate(outward.scale(style.text_gap + style.text_height * 0.5));
            Self {
                kind: DimensionKind::Aligned,
                definition_point: line_end,
                text_midpoint,
                extension_line_origin: p1,
                extension_line_end: p2,
                text: None,
                measurement: direction.length(),
                rotation: 0.0,
                style_name: style.name.clone(),
                layer: layer.into(),
            }
        }

        /// 尺寸线在第一测量点一侧的端点。
        pub fn dimension_line_start(&self) -> Point2 {
            let offset = Vector2::from_points(self.extension_line_end, self.definition_point);
            self.extension_line_origin.translate(offset)
        }

        /// 尺寸线相对测量边的偏移向量。
        pub fn offset(&self) -> Vector2 {
            Vector2::from_points(self.extension_line_end, self.definition_point)
        }
    }

    /// 内存文档：图层、标注样式与实体均按插入顺序保存，保证输出可复现。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: Vec<Layer>,
        dimension_styles: Vec<DimensionStyle>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        /// 确保图层存在；已存在时保持原颜色。
        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if self.layer(key).is_none() {
                self.layers.push(Layer::new(key));
            }
        }

        /// 新建或覆盖图层颜色。
        pub fn add_layer(&mut self, name: impl AsRef<str>, color: i16) {
            let key = name.as_ref();
            match self.layers.iter_mut().find(|layer| layer.name == key) {
                Some(layer) => layer.color = color,
                None => self.layers.push(Layer::with_color(key, color)),
            }
        }

        /// 设置图层可见性，返回图层是否存在。
        pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> bool {
            match self.layers.iter_mut().find(|layer| layer.name == name) {
                Some(layer) => {
                    layer.is_visible = visible;
                    true
                }
                None => false,
            }
        }

        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        pub fn add_dimension_style(&mut self, style: DimensionStyle) {
            match self
                .dimension_styles
                .iter_mut()
                .find(|existing| existing.name == style.name)
            {
                Some(existing) => *existing = style,
                None => self.dimension_styles.push(style),
            }
        }

        pub fn dimension_style(&self, name: &str) -> Option<&DimensionStyle> {
            self.dimension_styles.iter().find(|style| style.name == name)
        }

        #[inline]
        pub fn dimension_styles(&self) -> impl Iterator<Item = &DimensionStyle> {
            self.dimension_styles.iter()
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed, layer)
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let collected: Vec<PolylineVertex> = vertices.into_iter().collect();
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: collected,
                    is_closed,
                    layer,
                }),
            ));
            id
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Text(Text {
                    insert,
                    content: content.into(),
                    height,
                    rotation,
                    layer,
                }),
            ));
            id
        }

        pub fn add_dimension(&mut self, dimension: Dimension) -> EntityId {
            self.ensure_layer(&dimension.layer);
            let id = self.next_id();
            self.entities.push((id, Entity::Dimension(dimension)));
            id
        }

        /// 按样式添加对齐标注；样式需预先通过 [`Document::add_dimension_style`] 注册，
        /// 未注册时返回 `None`。
        pub fn add_aligned_dimension(
            &mut self,
            p1: Point2,
            p2: Point2,
            distance: f64,
            style_name: &str,
            layer: impl Into<String>,
        ) -> Option<EntityId> {
            let style = self.dimension_style(style_name)?.clone();
            let dimension = Dimension::aligned(p1, p2, distance, &style, layer);
            Some(self.add_dimension(dimension))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            match entity {
                Entity::Polyline(polyline) => self.add_polyline_with_vertices(
                    polyline.vertices,
                    polyline.is_closed,
                    polyline.layer,
                ),
                Entity::Text(text) => self.add_text(
                    text.insert,
                    text.content,
                    text.height,
                    text.rotation,
                    text.layer,
                ),
                Entity::Dimension(dimension) => self.add_dimension(dimension),
            }
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        pub fn entities_on_layer<'a>(
            &'a self,
            layer: &'a str,
        ) -> impl Iterator<Item = &'a Entity> + 'a {
            self.entities
                .iter()
                .map(|(_, entity)| entity)
                .filter(move |entity| entity.layer_name() == layer)
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 全部实体的包围盒；空文档返回 `None`。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
