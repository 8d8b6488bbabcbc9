use ignis_render::draw_call::{SortItem, sort_draw_calls, sort_key};
use ignis_render::Layer;
use ignis_shadergen::BlendType;

fn opaque(index: usize, layer: Layer, material: u32) -> SortItem {
    SortItem {
        index,
        layer,
        key: sort_key(layer, BlendType::None, false, material),
        distance: None,
    }
}

fn blended(index: usize, material: u32, distance: f32) -> SortItem {
    SortItem {
        index,
        layer: Layer::World,
        key: sort_key(Layer::World, BlendType::Normal, false, material),
        distance: Some(distance),
    }
}

fn order(items: &[SortItem]) -> Vec<usize> {
    items.iter().map(|item| item.index).collect()
}

#[test]
fn layers_dominate_every_other_criterion() {
    let mut items = vec![
        opaque(0, Layer::Hud, 90),
        opaque(1, Layer::Fx, 1),
        blended(2, 3, 100.0),
        opaque(3, Layer::Gizmo, 50),
        opaque(4, Layer::World, 2),
    ];
    sort_draw_calls(&mut items);

    assert_eq!(order(&items), [4, 2, 1, 3, 0]);
}

#[test]
fn opaque_items_group_by_material() {
    let mut items = vec![
        opaque(0, Layer::World, 1),
        opaque(1, Layer::World, 2),
        opaque(2, Layer::World, 1),
        opaque(3, Layer::World, 2),
    ];
    sort_draw_calls(&mut items);

    assert_eq!(order(&items), [1, 3, 0, 2]);
}

#[test]
fn commands_precede_meshes_of_the_same_blend_bucket() {
    let command = SortItem {
        index: 0,
        layer: Layer::World,
        key: sort_key(Layer::World, BlendType::None, true, 0),
        distance: None,
    };
    let mut items = vec![command, opaque(1, Layer::World, 7)];
    sort_draw_calls(&mut items);

    assert_eq!(order(&items), [0, 1]);
}

#[test]
fn equal_items_keep_submission_order() {
    let mut items: Vec<SortItem> = (0..16).map(|index| blended(index, 4, 2.5)).collect();
    sort_draw_calls(&mut items);

    assert_eq!(order(&items), (0..16).collect::<Vec<_>>());
}

#[test]
fn ordering_ignores_submission_order_of_distinct_items() {
    let items = vec![
        blended(0, 1, 3.0),
        opaque(1, Layer::World, 5),
        blended(2, 1, 9.0),
        opaque(3, Layer::Hud, 1),
        opaque(4, Layer::World, 6),
    ];
    let mut forward = items.clone();
    let mut reversed: Vec<SortItem> = items.into_iter().rev().collect();

    sort_draw_calls(&mut forward);
    sort_draw_calls(&mut reversed);
    assert_eq!(order(&forward), order(&reversed));
}
