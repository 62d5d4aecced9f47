//! FormSpy inside a mounted form

use std::cell::RefCell;
use std::rc::Rc;

use formbind::prelude::*;
use formbind::testing::{values, MemoryForm, RenderCount};
use serde_json::json;

fn form() -> Form<()> {
    Form::new::<MemoryForm>(
        &Scope::root(),
        FormProps::new()
            .initial_values(values(json!({"name": "erik"})))
            .on_submit(|_: &Values, _: &dyn FormApi| None)
            .render(|_: &FormRenderProps| ()),
    )
}

fn keep(props: &FieldRenderProps) -> FieldRenderProps {
    props.clone()
}

#[test]
fn test_on_change_reports_each_distinct_state_after_commit() {
    let mut form = form();
    let mut field = Field::new(form.scope(), FieldProps::new("name").render(keep)).expect("field");
    let seen: Rc<RefCell<Vec<Values>>> = Rc::default();
    let sink = seen.clone();
    let mut spy = FormSpy::<()>::new(
        form.scope(),
        FormSpyProps::new()
            .subscription(FormSubscription::VALUES)
            .on_change(move |state: &FormState| sink.borrow_mut().push(state.values.clone())),
    )
    .expect("spy");

    form.render().expect("render");
    field.render().expect("render");
    assert_eq!(spy.render(), Ok(None));
    assert!(seen.borrow().is_empty());

    field.commit();
    spy.commit();
    form.commit();
    assert_eq!(*seen.borrow(), vec![values(json!({"name": "erik"}))]);

    let input = field.render_props().input;
    input.focus();
    input.change("erikras");
    input.change("erikras");
    input.blur();
    assert_eq!(seen.borrow().len(), 1);

    spy.commit();
    assert_eq!(
        *seen.borrow(),
        vec![
            values(json!({"name": "erik"})),
            values(json!({"name": "erikras"})),
        ]
    );
}

#[test]
fn test_render_mode_follows_subscription() {
    let mut form = form();
    let mut field = Field::new(form.scope(), FieldProps::new("name").render(keep)).expect("field");
    let renders = RenderCount::new();
    let count = renders.clone();
    let mut spy = FormSpy::new(
        form.scope(),
        FormSpyProps::new()
            .subscription(FormSubscription::DIRTY | FormSubscription::VALUES)
            .render(move |props: &FormSpyRenderProps| {
                count.tick();
                props.state.dirty
            }),
    )
    .expect("spy");

    form.render().expect("render");
    field.render().expect("render");
    assert_eq!(spy.render(), Ok(Some(false)));
    field.commit();
    spy.commit();
    form.commit();

    field.render_props().input.focus();
    assert!(!spy.needs_render());

    field.render_props().input.change("erikras");
    assert!(spy.needs_render());
    assert_eq!(spy.render(), Ok(Some(true)));
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_spy_needs_form() {
    let err = FormSpy::<()>::new(&Scope::root(), FormSpyProps::new()).err();
    assert_eq!(
        err.map(|e| e.to_string()),
        Some("FormSpy must be used inside of a Form component".to_string())
    );
}
